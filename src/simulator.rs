use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;

use crate::circuit::{Circuit, NodeId};
use crate::cli::OutputFormat;
use crate::mna::MnaSystem;
use crate::output;
use crate::parser::NetlistParser;
use crate::solver::{LinearSolver, SolverConfig};

/// Voltage of one non-ground node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeVoltage {
    pub id: NodeId,
    pub name: String,
    pub voltage: f64,
}

/// Simulation results container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub title: String,
    /// Ascending node id, ground excluded
    pub node_voltages: Vec<NodeVoltage>,
    pub residual_norm: f64,
    pub solve_time: f64,
    pub success: bool,
}

impl SimulationResult {
    pub fn voltage(&self, name: &str) -> Option<f64> {
        self.node_voltages
            .iter()
            .find(|v| v.name == name)
            .map(|v| v.voltage)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimulatorConfig {
    pub solver_config: SolverConfig,
    /// Print the assembled equations before solving
    pub show_system: bool,
}

/// Main simulator engine
pub struct Simulator {
    circuit: Option<Circuit>,
    mna_system: Option<MnaSystem>,
    solver: LinearSolver,
    results: Option<SimulationResult>,
    config: SimulatorConfig,
}

impl Simulator {
    /// Create a new simulator with default configuration
    pub fn new() -> Self {
        Self::with_config(SimulatorConfig::default())
    }

    /// Create a new simulator with custom configuration
    pub fn with_config(config: SimulatorConfig) -> Self {
        let solver = LinearSolver::with_config(config.solver_config.clone());
        Simulator {
            circuit: None,
            mna_system: None,
            solver,
            results: None,
            config,
        }
    }

    /// Load a circuit description from file
    pub fn load_netlist(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        info!("Loading netlist from: {}", path.display());

        let circuit = NetlistParser::new()
            .parse_file(path)
            .with_context(|| format!("Failed to load '{}'", path.display()))?;

        self.load_circuit(circuit)
    }

    /// Validate a circuit and allocate its equation system
    pub fn load_circuit(&mut self, circuit: Circuit) -> Result<()> {
        circuit
            .validate()
            .context("the circuit has a logical error: either a floating node was detected or the circuit has fewer than 2 nodes")?;

        info!("Loaded circuit: {}", circuit.title);
        circuit.log_summary();

        self.mna_system = Some(MnaSystem::new(&circuit)?);
        self.circuit = Some(circuit);
        self.results = None;

        Ok(())
    }

    /// Run operating point analysis
    pub fn run_operating_point(&mut self) -> Result<()> {
        info!("Starting operating point analysis");
        let start_time = Instant::now();

        let circuit = self.circuit.as_ref().ok_or_else(|| anyhow!("No circuit loaded"))?;
        let mna_system = self.mna_system.as_mut().ok_or_else(|| anyhow!("No MNA system available"))?;

        mna_system.assemble_dc(circuit)?;
        let (matrix, rhs) = mna_system.equations();

        if self.config.show_system {
            print!("{}", output::format_system(matrix, rhs));
        }

        let (solution, stats) = self.solver.solve_dense(matrix, rhs)?;
        if !stats.success {
            warn!("Residual norm {:.3e} is larger than expected", stats.residual_norm);
        }

        let node_voltages = circuit
            .non_ground_nodes()
            .map(|node| NodeVoltage {
                id: node.id,
                name: node.name.clone(),
                voltage: solution[node.id - 1],
            })
            .collect();

        self.results = Some(SimulationResult {
            title: circuit.title.clone(),
            node_voltages,
            residual_norm: stats.residual_norm,
            solve_time: stats.solve_time,
            success: stats.success,
        });

        info!(
            "Operating point analysis completed in {:.3}ms",
            start_time.elapsed().as_secs_f64() * 1000.0
        );

        Ok(())
    }

    /// Get simulation results
    pub fn get_results(&self) -> Option<&SimulationResult> {
        self.results.as_ref()
    }

    pub fn circuit(&self) -> Option<&Circuit> {
        self.circuit.as_ref()
    }

    /// The most recently assembled equations
    pub fn system(&self) -> Option<&MnaSystem> {
        self.mna_system.as_ref()
    }

    /// Export simulation results to file
    pub fn export_results(&self, path: impl AsRef<Path>, format: OutputFormat) -> Result<()> {
        let results = self.results.as_ref().ok_or_else(|| anyhow!("No simulation results available"))?;

        match format {
            OutputFormat::Csv => output::export_csv(results, path.as_ref()),
            OutputFormat::Json => output::export_json(results, path.as_ref()),
        }
    }

    /// Print node voltages
    pub fn print_summary(&self) {
        match &self.results {
            Some(results) => {
                print!("{}", output::format_voltages(&results.node_voltages));
                if !results.success {
                    println!("warning: residual norm {:.2e}", results.residual_norm);
                }
            }
            None => println!("No simulation results available"),
        }
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}
