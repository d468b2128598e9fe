use colored::*;
use log::info;
use std::io;
use std::path::Path;

use nodal_sim::cli::{self, CliArgs};
use nodal_sim::simulator::{Simulator, SimulatorConfig};

fn main() {
    let matches = cli::build_command().get_matches();

    let args = match CliArgs::from_matches(&matches) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", format!("Error: {}", e).red());
            std::process::exit(2);
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_level())).init();

    // Written straight to stderr so RUST_LOG filters can't hide it
    if let Err(e) = run_application(args) {
        eprintln!("{}", cli::error_message(&e).red());
        std::process::exit(1);
    }
}

fn run_application(args: CliArgs) -> anyhow::Result<()> {
    info!("{}", "Starting NodalSim".green().bold());

    let input_file = match args.input_file {
        Some(path) => path,
        None => cli::prompt_for_path(&mut io::stdin().lock(), &mut io::stdout())?,
    };
    info!("Input file: {}", input_file.bright_blue());

    // Validate input file exists
    if !Path::new(&input_file).exists() {
        return Err(anyhow::anyhow!("can't open the file '{}'", input_file));
    }

    let mut simulator = Simulator::with_config(SimulatorConfig {
        show_system: args.show_system,
        ..SimulatorConfig::default()
    });
    simulator.load_netlist(&input_file)?;
    simulator.run_operating_point()?;

    // Export results
    if let Some(output_file) = args.output_file {
        simulator.export_results(&output_file, args.output_format)?;
        info!("Results exported to: {}", output_file.bright_green());
    } else {
        simulator.print_summary();
    }

    info!("{}", "Simulation completed successfully!".green().bold());
    Ok(())
}
