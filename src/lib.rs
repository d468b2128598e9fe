pub mod circuit;
pub mod cli;
pub mod error;
pub mod mna;
pub mod output;
pub mod parser;
pub mod simulator;
pub mod solver;

// Re-export commonly used types
pub use circuit::{Branch, Circuit, Element, ElementKind, Node, NodeId, GROUND};
pub use error::{Error, Result};
pub use mna::{assemble_equations, MnaSystem};
pub use parser::NetlistParser;
pub use simulator::{NodeVoltage, SimulationResult, Simulator};
pub use solver::solve;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
