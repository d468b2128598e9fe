//! Console formatting and file export of results.

use anyhow::{Context, Result};
use csv::Writer;
use log::info;
use nalgebra::{DMatrix, DVector};
use std::fs::File;
use std::path::Path;

use crate::simulator::{NodeVoltage, SimulationResult};

/// Render the augmented system: one equation per line, coefficients
/// followed by the constant term.
pub fn format_system(matrix: &DMatrix<f64>, rhs: &DVector<f64>) -> String {
    let mut out = String::new();
    for (i, row) in matrix.row_iter().enumerate() {
        let coefficients: Vec<String> = row.iter().map(|g| format!("{:>12.6}", g)).collect();
        out.push_str(&coefficients.join(" "));
        out.push_str(&format!(" | {:>12.6}\n", rhs[i]));
    }
    out
}

/// One `V<id> (<name>) = <value> V` line per node, in the given order.
pub fn format_voltages(voltages: &[NodeVoltage]) -> String {
    voltages
        .iter()
        .map(|v| format!("V{} ({}) = {:.6} V\n", v.id, v.name, v.voltage))
        .collect()
}

/// Export results to CSV format
pub fn export_csv(results: &SimulationResult, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create '{}'", path.display()))?;
    let mut writer = Writer::from_writer(file);

    writer.write_record(["node", "name", "voltage"])?;
    for v in &results.node_voltages {
        writer.write_record(&[v.id.to_string(), v.name.clone(), v.voltage.to_string()])?;
    }

    writer.flush()?;
    info!("Results exported to CSV: {}", path.display());
    Ok(())
}

/// Export results to JSON format
pub fn export_json(results: &SimulationResult, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create '{}'", path.display()))?;
    serde_json::to_writer_pretty(file, results)?;

    info!("Results exported to JSON: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{dmatrix, dvector};

    fn sample() -> SimulationResult {
        SimulationResult {
            title: "sample".to_string(),
            node_voltages: vec![
                NodeVoltage { id: 1, name: "a".to_string(), voltage: 2.5 },
                NodeVoltage { id: 2, name: "b".to_string(), voltage: -0.5 },
            ],
            residual_norm: 0.0,
            solve_time: 0.0,
            success: true,
        }
    }

    #[test]
    fn test_format_voltages() {
        let text = format_voltages(&sample().node_voltages);
        assert_eq!(text, "V1 (a) = 2.500000 V\nV2 (b) = -0.500000 V\n");
    }

    #[test]
    fn test_format_system_has_one_line_per_row() {
        let text = format_system(&dmatrix![1.0, -1.0; 0.0, 2.0], &dvector![3.0, 4.0]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("|     3.000000"));
        assert!(lines[1].contains("2.000000"));
    }

    #[test]
    fn test_export_csv_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let results = sample();

        let csv_path = dir.path().join("out.csv");
        export_csv(&results, &csv_path).unwrap();
        let csv_text = std::fs::read_to_string(&csv_path).unwrap();
        assert_eq!(csv_text, "node,name,voltage\n1,a,2.5\n2,b,-0.5\n");

        let json_path = dir.path().join("out.json");
        export_json(&results, &json_path).unwrap();
        let parsed: SimulationResult =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(parsed.node_voltages, results.node_voltages);
    }
}
