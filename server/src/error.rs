use thiserror::Error;

use crate::catalog::Position;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {0}")]
    Load(String),
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CatalogError {
    #[error("Catalog has no entries")]
    Empty,
    #[error("Catalog positions must be dense: expected {expected}, found {found}")]
    PositionGap { expected: Position, found: Position },
    #[error("Catalog entry {0} has no letters in its name")]
    EmptyName(Position),
    #[error("Catalog entries {first} and {second} both normalize to '{key}'")]
    DuplicateKey {
        key: String,
        first: Position,
        second: Position,
    },
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("Web server/handler error: {0}")]
    Web(#[from] crate::web::WebError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration parsing error: {0}")]
    ConfigParsing(#[from] config::ConfigError),
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
