use crate::config::Config;
use log::{LevelFilter, SetLoggerError};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

/// Dependencies whose records are dropped below Trace.
const NOISY_DEPENDENCIES: &[&str] = &["redis", "tower", "tower_sessions", "hyper", "axum"];

pub struct Logger;

impl Logger {
    /// Installs the terminal logger at the configured level.
    pub fn init_logger(config: &Config) -> Result<(), SetLoggerError> {
        TermLogger::init(
            config.log_level_filter,
            log_config(config.log_level_filter),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        )
    }
}

fn log_config(level: LevelFilter) -> simplelog::Config {
    let mut builder = ConfigBuilder::new();
    builder.set_time_format_rfc3339();

    if level != LevelFilter::Trace {
        for module in NOISY_DEPENDENCIES {
            builder.add_filter_ignore_str(module);
        }
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_client_logs_are_filtered() {
        assert!(NOISY_DEPENDENCIES.contains(&"redis"));
        assert!(NOISY_DEPENDENCIES.contains(&"tower_sessions"));
    }

    #[test]
    fn log_config_builds_for_every_level() {
        for level in [LevelFilter::Off, LevelFilter::Info, LevelFilter::Trace] {
            let _config = log_config(level);
        }
    }
}
