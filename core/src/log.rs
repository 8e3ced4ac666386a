//! Logger and logging macros.
//!
//! For the macros to compile, the calling crate must depend on crate `log`
//! (ie. `log.workspace = true`).

mod appender;
mod consts;
mod logger;

pub use consts::DEFAULT_LOGGER_ENV;
pub use logger::LogError;

use appender::AppenderSpec;
use consts::{ERR_LOG_FILE_NAME, LOG_FILE_NAME};
use log::LevelFilter;
use log4rs::{Config, config::Root};
use std::iter::once;

const CONSOLE_APPENDER: &str = "stdout";
const LOG_FILE_APPENDER: &str = "log_file";
const ERR_LOG_FILE_APPENDER: &str = "err_log_file";

/// Installs a log4rs logger writing to stdout and, when `log_dir` is provided, to a rolling
/// log file plus a warnings-and-errors file.
///
/// `filters` is a comma separated list of `level` or `target=level` items, for instance
/// `info,batchwire_client=trace`. Items read from the `RUST_LOG` environment variable are
/// applied first, explicit `filters` override them.
pub fn init_logger(log_dir: Option<&str>, filters: &str) -> Result<(), LogError> {
    let mut stdout_appender = AppenderSpec::console(CONSOLE_APPENDER, None);
    let mut file_appender = log_dir.map(|dir| AppenderSpec::roller(LOG_FILE_APPENDER, None, dir, LOG_FILE_NAME)).transpose()?;
    let mut err_file_appender = log_dir
        .map(|dir| AppenderSpec::roller(ERR_LOG_FILE_APPENDER, Some(LevelFilter::Warn), dir, ERR_LOG_FILE_NAME))
        .transpose()?;

    let root_appenders = once(CONSOLE_APPENDER)
        .chain(file_appender.as_ref().map(|x| x.name))
        .chain(err_file_appender.as_ref().map(|x| x.name))
        .collect::<Vec<_>>();
    let appenders =
        once(&mut stdout_appender).chain(file_appender.as_mut()).chain(err_file_appender.as_mut()).filter_map(|x| x.appender());

    let loggers = logger::Builder::new().root_level(LevelFilter::Info).parse_env(DEFAULT_LOGGER_ENV).parse_expression(filters).build();

    let config = Config::builder()
        .appenders(appenders)
        .loggers(loggers.items())
        .build(Root::builder().appenders(root_appenders).build(loggers.root_level()))
        .map_err(|err| LogError::Config(err.to_string()))?;

    log4rs::init_config(config).map_err(|err| LogError::Init(err.to_string()))?;
    Ok(())
}

#[macro_export]
macro_rules! trace {
    ($($t:tt)*) => (
        ::log::trace!($($t)*)
    )
}

#[macro_export]
macro_rules! debug {
    ($($t:tt)*) => (
        ::log::debug!($($t)*)
    )
}

#[macro_export]
macro_rules! info {
    ($($t:tt)*) => (
        ::log::info!($($t)*)
    )
}

#[macro_export]
macro_rules! warn {
    ($($t:tt)*) => (
        ::log::warn!($($t)*)
    )
}

#[macro_export]
macro_rules! error {
    ($($t:tt)*) => (
        ::log::error!($($t)*)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logger_once() {
        let dir = std::env::temp_dir().join(format!("batchwire-log-{}", std::process::id()));
        let dir = dir.to_str().unwrap();
        assert_eq!(init_logger(Some(dir), "info,batchwire_core=trace"), Ok(()));
        crate::info!("logger installed in {}", dir);

        // a second logger cannot be installed in the same process
        assert!(matches!(init_logger(None, "debug"), Err(LogError::Init(_))));
    }
}
