use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SeirError {
    /// Invalid virus parameters or intervention schedule.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The ODE solver failed; no trajectory is produced.
    #[error("integration failed on day {day}: {message}")]
    Integration { day: usize, message: String },

    /// The offset search has nothing to match against.
    #[error("alignment error: {0}")]
    Alignment(String),
}

impl SeirError {
    pub fn config(message: impl Into<String>) -> Self {
        SeirError::Configuration(message.into())
    }

    pub fn integration(day: usize, message: impl Into<String>) -> Self {
        SeirError::Integration {
            day,
            message: message.into(),
        }
    }
}
