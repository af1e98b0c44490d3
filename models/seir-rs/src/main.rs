use anyhow::{Context, Result};
use seir::{
    RunConfig,
    data::{self, RegionSeries},
    output::{self, ACTUAL_HEADER, MODEL_HEADER, TRAJECTORY_HEADER},
    run_model,
};
use seir_runner::Environment;

fn main() -> Result<()> {
    env_logger::init();

    // Run document: TOML file when a path is given, JSON on stdin otherwise
    let env = match std::env::args().nth(1) {
        Some(path) => Environment::from_toml_file(&path)
            .with_context(|| format!("failed to read run document {path}"))?,
        None => Environment::from_stdin().context("failed to read run document from stdin")?,
    }
    .with_input_type::<RunConfig>()
    .context("invalid model input")?;
    let config = env.input.clone().unwrap_or_default();
    let region = &config.region;
    let fetcher = region.fetcher();

    let reported: RegionSeries = data::load_region(
        &fetcher,
        &region.cases_source(env.file("cases")),
        region,
    )
    .with_context(|| format!("failed to load reported data for {}", region.name))?;

    let population = match config.population {
        Some(population) => population,
        None => data::load_population(
            &fetcher,
            &region.population_source(env.file("population")),
            region,
        )
        .with_context(|| format!("failed to look up population of {}", region.name))?,
    };
    log::info!("{}: population {population}", region.name);

    let run = run_model(&config, &reported, population as f64)?;

    let stem = region.name.replace(' ', "_");
    env.write_csv(
        &format!("{stem}_actual_data.csv"),
        &ACTUAL_HEADER,
        &output::actual_rows(&reported),
    )?;
    env.write_csv(
        &format!("{stem}_model.csv"),
        &MODEL_HEADER,
        &output::model_rows(
            &region.name,
            &run.dates,
            &run.observables,
            config.virus.r0,
            config.virus.fatality_rate,
        ),
    )?;
    env.write_csv(
        &format!("{stem}_trajectory.csv"),
        &TRAJECTORY_HEADER,
        &output::trajectory_rows(&run.dates, &run.trajectory),
    )?;

    log::info!("total predicted deaths: {:.0}", run.total_deaths());
    if let Some(actual) = reported.deaths.last() {
        log::info!("actual deaths: {actual:.0}");
    }
    if let Some(date) = run.date_of(config.schedule.intervention_start) {
        log::info!("lockdown measures start: {date}");
    }

    Ok(())
}
