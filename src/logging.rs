/*
 * Logger bootstrap for hosts embedding the engine. Combines a terminal
 * logger with an optional file logger in the given directory. The engine
 * itself only ever uses the `log` facade; calling this is the host's choice,
 * and a host with its own logger setup can skip it entirely.
 */
use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::fs::File;
use std::path::Path;
use time::macros::format_description;

const LOG_FILENAME: &str = "context_packer.log";

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_custom(format_description!("[hour]:[minute]:[second]"))
        .build()
}

/*
 * Initializes logging at the given level. When `log_dir` is provided, log
 * lines are additionally written to `context_packer.log` inside it; failure
 * to create that file degrades to terminal-only logging rather than failing
 * the call. Calling this twice returns the underlying `SetLoggerError`.
 */
pub fn init_logging(
    level: LevelFilter,
    log_dir: Option<&Path>,
) -> Result<(), log::SetLoggerError> {
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        build_config(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];

    let mut file_error = None;
    if let Some(dir) = log_dir {
        let log_path = dir.join(LOG_FILENAME);
        match File::create(&log_path) {
            Ok(file) => loggers.push(WriteLogger::new(level, build_config(), file)),
            Err(e) => file_error = Some((log_path, e)),
        }
    }

    CombinedLogger::init(loggers)?;

    if let Some((log_path, e)) = file_error {
        log::warn!("Logging: Could not create log file {log_path:?}: {e}. Using terminal only.");
    }
    log::debug!("Logging: Initialized at level {level}.");
    Ok(())
}
