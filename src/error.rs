//! Error types for nodal-sim.

use std::path::PathBuf;

use thiserror::Error;

use crate::circuit::NodeId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("syntax error at line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("logical error at line {line}: {source}")]
    Construction {
        line: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("can't add a voltage source and a current source to the same branch")]
    MixedSources,

    #[error("can't add two current sources to the same branch")]
    DuplicateCurrentSource,

    #[error("can't attach a branch whose resistances add up to zero")]
    ZeroResistance,

    #[error("can't attach an empty branch between two nodes")]
    EmptyBranch,

    #[error("can't attach a branch between node {0} and itself")]
    SelfLoop(NodeId),

    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("circuit needs at least 2 nodes, found {0}")]
    TooFewNodes(usize),

    #[error("floating node detected: '{name}' has {incidences} connection(s)")]
    FloatingNode { name: String, incidences: usize },

    #[error("detected a voltage source loop through node {0} (undefined circuit)")]
    VoltageLoop(NodeId),

    #[error("singular matrix at column {column} (no unique solution)")]
    SingularMatrix { column: usize },

    #[error("invalid matrix dimensions: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("can't read '{}': {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Attach the netlist line a construction error was raised on.
    pub fn at_line(self, line: usize) -> Self {
        match self {
            Error::Syntax { .. } | Error::Construction { .. } => self,
            other => Error::Construction {
                line,
                source: Box::new(other),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
