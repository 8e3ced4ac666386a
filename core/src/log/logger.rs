use log::LevelFilter;
use log4rs::config::Logger;
use std::{collections::BTreeMap, env, mem};
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LogError {
    #[error("Logger spec parsing error: {0}")]
    ParseLoggerSpec(String),

    #[error("Log appender error: {0}")]
    Appender(String),

    #[error("Logger configuration error: {0}")]
    Config(String),

    #[error("Logger initialization error: {0}")]
    Init(String),
}

/// Logger levels resolved from filter expressions.
pub(super) struct Loggers {
    targets: BTreeMap<String, LevelFilter>,
    root_level: LevelFilter,
}

impl Loggers {
    pub fn root_level(&self) -> LevelFilter {
        self.root_level
    }

    #[cfg(test)]
    pub fn level(&self, target: &str) -> Option<LevelFilter> {
        self.targets.get(target).copied()
    }

    pub fn items(&self) -> impl Iterator<Item = Logger> + '_ {
        self.targets.iter().map(|(name, level)| Logger::builder().build(name.clone(), *level))
    }
}

pub(super) struct Builder {
    targets: BTreeMap<String, LevelFilter>,
    root_level: Option<LevelFilter>,
}

impl Builder {
    pub fn new() -> Builder {
        Builder { targets: BTreeMap::new(), root_level: None }
    }

    pub fn parse_env(&mut self, env: &str) -> &mut Self {
        self.parse_expression(&env::var(env).unwrap_or_default())
    }

    /// Applies a `level,target=level,...` expression. Invalid items are reported on stderr
    /// and skipped since no logger is installed yet.
    pub fn parse_expression(&mut self, expression: &str) -> &mut Self {
        for item in expression.split(',').map(str::trim).filter(|x| !x.is_empty()) {
            match Self::parse_item(item) {
                Ok((Some(target), level)) => {
                    self.targets.insert(target.to_string(), level);
                }
                Ok((None, level)) => {
                    self.root_level = Some(level);
                }
                Err(err) => eprintln!("Ignoring invalid logging spec: {err}"),
            }
        }
        self
    }

    fn parse_item(item: &str) -> Result<(Option<&str>, LevelFilter), LogError> {
        let mut parts = item.split('=').map(str::trim);
        match (parts.next(), parts.next(), parts.next()) {
            // a lone level defines the root level, a lone target enables it fully
            (Some(part), None, None) => match part.parse() {
                Ok(level) => Ok((None, level)),
                Err(_) => Ok((Some(part), LevelFilter::max())),
            },
            (Some(target), Some(""), None) if !target.is_empty() => Ok((Some(target), LevelFilter::max())),
            (Some(target), Some(level), None) if !target.is_empty() => {
                level.parse().map(|level| (Some(target), level)).map_err(|_| LogError::ParseLoggerSpec(item.to_string()))
            }
            _ => Err(LogError::ParseLoggerSpec(item.to_string())),
        }
    }

    pub fn root_level(&mut self, root_level: LevelFilter) -> &mut Self {
        self.root_level = Some(root_level);
        self
    }

    pub fn build(&mut self) -> Loggers {
        Loggers { targets: mem::take(&mut self.targets), root_level: self.root_level.take().unwrap_or(LevelFilter::Error) }
    }
}
