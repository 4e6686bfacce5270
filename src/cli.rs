use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "parseflow")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Tree-walking interpreter for the ParseFlow language", long_about = None)]
pub struct Args {
    /// Script to execute; starts the REPL when omitted.
    #[arg(value_name = "SCRIPT")]
    pub script: Option<PathBuf>,

    /// Evaluate a one-liner instead of a script file.
    #[arg(short = 'c', long = "command", value_name = "SOURCE", conflicts_with = "script")]
    pub eval: Option<String>,

    #[arg(long = "color", value_name = "WHEN", default_value = "auto")]
    pub color: ColorChoice,

    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Write a linearized dump of each parsed tree to this file.
    #[arg(long = "emit-ast", value_name = "FILE")]
    pub emit_ast: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Complete {
        #[arg(value_name = "SHELL")]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy)]
pub enum ColorChoice {
    Auto,
    Always,
    Never,
}

impl std::str::FromStr for ColorChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ColorChoice::Auto),
            "always" => Ok(ColorChoice::Always),
            "never" => Ok(ColorChoice::Never),
            _ => Err(format!(
                "Invalid color choice: {}. Must be 'auto', 'always', or 'never'",
                s
            )),
        }
    }
}

pub fn generate_completions(shell: Shell) {
    let mut cmd = Args::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, &bin_name, &mut io::stdout());
}
