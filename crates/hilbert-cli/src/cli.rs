use clap::{Parser, Subcommand, ValueEnum};
use hilbert_service::Service;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "hilbert",
    about = "Hilbert: tautology, well-formedness and formal proof checks over parsed modules",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Decide whether a formula is a propositional tautology
    Tautology {
        /// Path to the formula JSON
        formula: PathBuf,

        /// Stop at the first falsifying valuation
        #[arg(long)]
        short_circuit: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run one module service inside a job
    Check {
        /// Module JSON files; every import of the target must be among them
        #[arg(required = true)]
        modules: Vec<PathBuf>,

        /// Address of the module to check
        #[arg(long)]
        target: String,

        /// Service to run
        #[arg(long, value_enum, default_value = "proofs")]
        service: ServiceArg,

        /// Config file (defaults to ./hilbert.toml when present)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Rule version for modules that declare none
        #[arg(long)]
        rule_version: Option<String>,

        /// Stop truth tables at the first falsifying valuation
        #[arg(long)]
        short_circuit: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the rule versions proof checkers exist for
    Versions {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ServiceArg {
    Load,
    WellFormed,
    Proofs,
    Tautologies,
}

impl From<ServiceArg> for Service {
    fn from(arg: ServiceArg) -> Self {
        match arg {
            ServiceArg::Load => Service::LoadRequiredModules,
            ServiceArg::WellFormed => Service::CheckWellFormed,
            ServiceArg::Proofs => Service::CheckFormalProofs,
            ServiceArg::Tautologies => Service::CheckTautologies,
        }
    }
}
