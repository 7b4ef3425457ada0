//! Crate-level error type.

use crate::complexity::ShapeError;
use crate::config::ConfigError;
use crate::graph::GraphError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),
}

impl From<ShapeError> for Error {
    fn from(err: ShapeError) -> Self {
        Error::Graph(GraphError::Shape(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
