//! Reported case/death series and population figures for a region.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use seir_runner::{FetchError, Fetcher, Source};
use serde::{Deserialize, Serialize};

pub const US_URL: &str = "https://raw.githubusercontent.com/nytimes/covid-19-data/master/us.csv";
pub const STATES_URL: &str =
    "https://raw.githubusercontent.com/nytimes/covid-19-data/master/us-states.csv";
pub const COUNTIES_URL: &str =
    "https://raw.githubusercontent.com/nytimes/covid-19-data/master/us-counties.csv";
pub const POPULATION_URL: &str = "https://www2.census.gov/programs-surveys/popest/datasets/2010-2019/national/totals/nst-est2019-popchg2010_2019.csv";

#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("{source_name}: {message}")]
    Parse {
        source_name: String,
        message: String,
    },

    #[error("no reported data for region {0:?}")]
    RegionNotFound(String),

    #[error("no population figure for {0:?}")]
    PopulationNotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionKind {
    #[default]
    Nation,
    State,
    County,
}

impl RegionKind {
    pub fn default_url(&self) -> &'static str {
        match self {
            RegionKind::Nation => US_URL,
            RegionKind::State => STATES_URL,
            RegionKind::County => COUNTIES_URL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    pub name: String,
    pub kind: RegionKind,
    /// Narrows a county lookup to one state; county names repeat across states.
    pub state: Option<String>,
    /// Ignore cached downloads and fetch again.
    pub update_data: bool,
    pub cache_dir: Option<PathBuf>,
    /// Column of the census file holding the population estimate.
    pub population_column: String,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            name: "United States".to_string(),
            kind: RegionKind::Nation,
            state: None,
            update_data: false,
            cache_dir: None,
            population_column: "POPESTIMATE2019".to_string(),
        }
    }
}

impl RegionConfig {
    pub fn fetcher(&self) -> Fetcher {
        Fetcher::new(self.cache_dir.clone(), self.update_data)
    }

    /// A local file takes precedence over the region's default URL.
    pub fn cases_source(&self, local: Option<&Path>) -> Source {
        match local {
            Some(path) => Source::Path(path.to_path_buf()),
            None => Source::Url(self.kind.default_url().to_string()),
        }
    }

    pub fn population_source(&self, local: Option<&Path>) -> Source {
        match local {
            Some(path) => Source::Path(path.to_path_buf()),
            None => Source::Url(POPULATION_URL.to_string()),
        }
    }
}

/// Chronological cumulative counts for one region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionSeries {
    pub name: String,
    pub dates: Vec<NaiveDate>,
    pub cases: Vec<f64>,
    pub deaths: Vec<f64>,
}

impl RegionSeries {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }
}

#[derive(Debug, Deserialize)]
struct ReportRow {
    date: String,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    county: Option<String>,
    cases: Option<f64>,
    deaths: Option<f64>,
}

/// Parses an NYT-style `date,[county,][state,][fips,]cases,deaths` file and
/// keeps the rows for `config.name`.
pub fn parse_region_csv(text: &str, config: &RegionConfig) -> Result<RegionSeries, DataError> {
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let mut rows = Vec::new();
    for result in reader.deserialize::<ReportRow>() {
        let row = result?;
        let keep = match config.kind {
            RegionKind::Nation => true,
            RegionKind::State => row.state.as_deref() == Some(config.name.as_str()),
            RegionKind::County => {
                row.county.as_deref() == Some(config.name.as_str())
                    && config
                        .state
                        .as_deref()
                        .is_none_or(|state| row.state.as_deref() == Some(state))
            }
        };
        if !keep {
            continue;
        }
        let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d").map_err(|err| {
            DataError::Parse {
                source_name: config.name.clone(),
                message: format!("bad date {:?}: {err}", row.date),
            }
        })?;
        rows.push((date, row.cases.unwrap_or(0.0), row.deaths.unwrap_or(0.0)));
    }

    if rows.is_empty() {
        return Err(DataError::RegionNotFound(config.name.clone()));
    }
    rows.sort_by_key(|(date, _, _)| *date);
    if let Some(pair) = rows.windows(2).find(|pair| pair[0].0 == pair[1].0) {
        let hint = match config.kind {
            RegionKind::County => "; set `state` to pick one county",
            _ => "",
        };
        return Err(DataError::Parse {
            source_name: config.name.clone(),
            message: format!("more than one row for {}{hint}", pair[0].0),
        });
    }

    Ok(RegionSeries {
        name: config.name.clone(),
        dates: rows.iter().map(|r| r.0).collect(),
        cases: rows.iter().map(|r| r.1).collect(),
        deaths: rows.iter().map(|r| r.2).collect(),
    })
}

/// Looks up `name` in the `NAME` column of a census estimates file.
pub fn parse_population_csv(text: &str, name: &str, column: &str) -> Result<u64, DataError> {
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let headers = reader.headers()?.clone();
    let position = |key: &str| {
        headers
            .iter()
            .position(|h| h.trim() == key)
            .ok_or_else(|| DataError::Parse {
                source_name: "population".to_string(),
                message: format!("missing column {key:?}"),
            })
    };
    let name_idx = position("NAME")?;
    let value_idx = position(column)?;

    for result in reader.records() {
        let record = result?;
        if record.get(name_idx).map(str::trim) != Some(name) {
            continue;
        }
        let raw = record.get(value_idx).unwrap_or_default().trim();
        return raw
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v > 0.0)
            .map(|v| v.round() as u64)
            .ok_or_else(|| DataError::Parse {
                source_name: "population".to_string(),
                message: format!("bad {column} value {raw:?} for {name}"),
            });
    }
    Err(DataError::PopulationNotFound(name.to_string()))
}

pub fn load_region(
    fetcher: &Fetcher,
    source: &Source,
    config: &RegionConfig,
) -> Result<RegionSeries, DataError> {
    log::info!("loading reported data for {} from {}", config.name, source.describe());
    let text = fetcher.fetch(source)?;
    parse_region_csv(&text, config)
}

pub fn load_population(
    fetcher: &Fetcher,
    source: &Source,
    config: &RegionConfig,
) -> Result<u64, DataError> {
    let text = fetcher.fetch(source)?;
    parse_population_csv(&text, &config.name, &config.population_column)
}

#[cfg(test)]
mod test {
    use super::*;

    const STATES: &str = "\
date,state,fips,cases,deaths
2020-03-02,Washington,53,18,6
2020-03-01,Washington,53,11,3
2020-03-01,Oregon,41,3,0
2020-03-02,Oregon,41,3,0
";

    const COUNTIES: &str = "\
date,county,state,fips,cases,deaths
2020-03-01,Washington,Oregon,41067,1,
2020-03-01,Washington,Utah,49053,2,0
2020-03-02,Washington,Oregon,41067,4,1
";

    fn config(name: &str, kind: RegionKind) -> RegionConfig {
        RegionConfig {
            name: name.to_string(),
            kind,
            ..RegionConfig::default()
        }
    }

    #[test]
    fn test_parse_state_rows_sorted() {
        let series = parse_region_csv(STATES, &config("Washington", RegionKind::State)).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.first_date(), NaiveDate::from_ymd_opt(2020, 3, 1));
        assert_eq!(series.cases, vec![11.0, 18.0]);
        assert_eq!(series.deaths, vec![3.0, 6.0]);
    }

    #[test]
    fn test_parse_national() {
        let text = "date,cases,deaths\n2020-01-21,1,0\n2020-01-22,1,0\n";
        let series = parse_region_csv(text, &RegionConfig::default()).unwrap();
        assert_eq!(series.name, "United States");
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn test_parse_county_with_state_filter() {
        let mut county = config("Washington", RegionKind::County);
        // Same county name in two states on the same day
        assert!(matches!(
            parse_region_csv(COUNTIES, &county),
            Err(DataError::Parse { .. })
        ));

        county.state = Some("Oregon".to_string());
        let oregon = parse_region_csv(COUNTIES, &county).unwrap();
        assert_eq!(oregon.cases, vec![1.0, 4.0]);
        // Empty death cells read as zero
        assert_eq!(oregon.deaths, vec![0.0, 1.0]);
    }

    #[test]
    fn test_region_not_found() {
        let result = parse_region_csv(STATES, &config("Atlantis", RegionKind::State));
        assert!(matches!(result, Err(DataError::RegionNotFound(_))));
    }

    #[test]
    fn test_bad_date_is_parse_error() {
        let text = "date,cases,deaths\n03/01/2020,1,0\n";
        let result = parse_region_csv(text, &RegionConfig::default());
        assert!(matches!(result, Err(DataError::Parse { .. })));
    }

    #[test]
    fn test_population_lookup() {
        let text = "\
SUMLEV,REGION,DIVISION,STATE,NAME,POPESTIMATE2018,POPESTIMATE2019
010,0,0,00,United States,327167439,328239523
040,4,9,41,Oregon,4190713,4217737
";
        assert_eq!(
            parse_population_csv(text, "Oregon", "POPESTIMATE2019").unwrap(),
            4_217_737
        );
        assert_eq!(
            parse_population_csv(text, "United States", "POPESTIMATE2018").unwrap(),
            327_167_439
        );
        assert!(matches!(
            parse_population_csv(text, "Atlantis", "POPESTIMATE2019"),
            Err(DataError::PopulationNotFound(_))
        ));
        assert!(matches!(
            parse_population_csv(text, "Oregon", "POPESTIMATE2030"),
            Err(DataError::Parse { .. })
        ));
    }

    #[test]
    fn test_load_region_from_local_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("us-states.csv");
        std::fs::write(&path, STATES).unwrap();

        let config = config("Oregon", RegionKind::State);
        let source = config.cases_source(Some(&path));
        let series = load_region(&config.fetcher(), &source, &config).unwrap();
        assert_eq!(series.cases, vec![3.0, 3.0]);

        let missing = config.cases_source(Some(&tmp.path().join("nope.csv")));
        assert!(matches!(
            load_region(&config.fetcher(), &missing, &config),
            Err(DataError::Fetch(FetchError::NotFound(_)))
        ));
    }

    #[test]
    fn test_default_sources() {
        let config = config("Oregon", RegionKind::State);
        assert_eq!(config.cases_source(None), Source::Url(STATES_URL.to_string()));
        assert_eq!(
            config.population_source(None),
            Source::Url(POPULATION_URL.to_string())
        );
    }
}
