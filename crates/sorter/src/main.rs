use slog::{error, info};
use sorter::{
    get_config_info, run_aligner, run_matcher, setup_logger, Command, PipelineConfig,
};

fn main() -> Result<(), anyhow::Error> {
    let request = get_config_info()?;
    let logger = setup_logger(request.settings.level.as_deref());

    info!(logger, "AQS Sorter starting...");
    info!(logger, "  Config: {}", request.source);

    let config = match PipelineConfig::from_settings(&request.settings) {
        Ok(config) => config,
        Err(err) => {
            error!(logger, "invalid configuration: {}", err);
            return Err(err.into());
        }
    };
    info!(
        logger,
        "  Years: {}-{}", config.year_start, config.year_end
    );

    match request.command {
        Command::Match { .. } => {
            info!(logger, "  Metadata: {}", config.matcher.metadata_file.display());
            info!(logger, "  Roster out: {}", config.matcher.output_file.display());
            match run_matcher(&config, &logger) {
                Ok(summary) => info!(
                    logger,
                    "Finished matching: {} stations, {} roster rows", summary.stations, summary.rows
                ),
                Err(err) => {
                    error!(&logger, "Error matching stations: {}", err);
                    return Err(err);
                }
            }
        }
        Command::Align { .. } => {
            info!(logger, "  Roster: {}", config.aligner.roster_file.display());
            info!(
                logger,
                "  Observation dir: {}",
                config.aligner.observation_dir.display()
            );
            info!(logger, "  Archive dir: {}", config.aligner.output_dir.display());
            match run_aligner(&config, &logger) {
                Ok(summary) => {
                    for (name, reason) in &summary.failed {
                        error!(logger, "  {} not extracted: {}", name, reason);
                    }
                    info!(
                        logger,
                        "Finished aligning: {} of {} quantities for {} stations",
                        summary.extracted.len(),
                        summary.extracted.len() + summary.failed.len(),
                        summary.stations
                    );
                }
                Err(err) => {
                    error!(&logger, "Error aligning series: {}", err);
                    return Err(err);
                }
            }
        }
    }
    Ok(())
}
