use anyhow::{anyhow, Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::io::{BufRead, Write};

#[derive(Debug, Clone)]
pub struct CliArgs {
    /// `None` when the path should be asked for interactively
    pub input_file: Option<String>,
    pub output_file: Option<String>,
    pub output_format: OutputFormat,
    pub verbose_level: u8,
    pub show_system: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Json,
}

pub fn build_command() -> Command {
    Command::new("nodalSim")
        .version(env!("CARGO_PKG_VERSION"))
        .about("DC node voltages of resistive circuits with ideal sources")
        .arg(
            Arg::new("input")
                .help("Circuit description file (asked for interactively if omitted)")
                .index(1),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Output file for node voltages"),
        )
        .arg(
            Arg::new("format")
                .short('f')
                .long("format")
                .value_name("FORMAT")
                .default_value("csv")
                .value_parser(["csv", "json"])
                .help("Output format"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .help("Increase verbosity level"),
        )
        .arg(
            Arg::new("show-system")
                .long("show-system")
                .action(ArgAction::SetTrue)
                .help("Print the assembled equations G | C before solving"),
        )
}

impl CliArgs {
    pub fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let input_file = matches.get_one::<String>("input").cloned();
        let output_file = matches.get_one::<String>("output").cloned();
        let verbose_level = matches.get_count("verbose");
        let show_system = matches.get_flag("show-system");

        let output_format = match matches.get_one::<String>("format").map(String::as_str) {
            Some("csv") | None => OutputFormat::Csv,
            Some("json") => OutputFormat::Json,
            Some(other) => return Err(anyhow!("Invalid output format: {}", other)),
        };

        Ok(CliArgs {
            input_file,
            output_file,
            output_format,
            verbose_level,
            show_system,
        })
    }

    /// Log filter matching the number of `-v` flags
    pub fn log_level(&self) -> &'static str {
        match self.verbose_level {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

/// Ask for the circuit file path and read one line from `input`.
pub fn prompt_for_path(input: &mut impl BufRead, prompt: &mut impl Write) -> Result<String> {
    writeln!(prompt, "Please enter the path of the circuit file:")?;
    prompt.flush()?;

    let mut line = String::new();
    input.read_line(&mut line).context("Failed to read the circuit file path")?;

    let path = line.trim();
    if path.is_empty() {
        return Err(anyhow!("No circuit file path given"));
    }
    Ok(path.to_string())
}

/// One-line report of a fatal error, including its chain of causes.
pub fn error_message(error: &anyhow::Error) -> String {
    format!("Error: {:#}", error)
}
