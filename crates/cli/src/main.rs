mod commands;
mod printing;

use clap::{Parser, Subcommand};
use germline_sim::SimError;
use std::path::PathBuf;

use commands::{run, validate};

/// Germline - forward-time population genetics simulator
#[derive(Parser, Debug)]
#[command(name = "germline")]
#[command(author, version, about = "Forward-time population genetics simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a simulation from a parameter file
    Run {
        /// Parameter file
        parameter_file: PathBuf,

        /// Script file with initialization statements and callbacks
        #[arg(long)]
        script: Option<PathBuf>,

        /// Override the random seed (default: #SEED section, else generated)
        #[arg(long)]
        seed: Option<i64>,

        /// Show progress bar (--progress false to disable)
        #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
        progress: bool,

        /// Print a JSON summary of the configuration and exit
        #[arg(long)]
        describe: bool,
    },

    /// Check a parameter file's grammar without running
    Validate {
        /// Parameter file
        parameter_file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            parameter_file,
            script,
            seed,
            progress,
            describe,
        } => run::run_simulation(&parameter_file, script.as_deref(), seed, progress, describe),
        Commands::Validate { parameter_file } => validate::validate_file(&parameter_file),
    };

    if let Err(error) = result {
        eprintln!("ERROR: {error:#}");
        if let Some(SimError::InvalidInput {
            usage: Some(usage), ..
        }) = error.downcast_ref::<SimError>()
        {
            eprintln!("\nRequired syntax:\n\n{usage}");
        }
        std::process::exit(1);
    }
}
