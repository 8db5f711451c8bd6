//! Hilbert CLI: the `hilbert` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    support::init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Tautology {
            formula,
            short_circuit,
            json,
        } => commands::tautology::run(formula, short_circuit, json),

        Commands::Check {
            modules,
            target,
            service,
            config,
            rule_version,
            short_circuit,
            json,
        } => commands::check::run(commands::check::Args {
            modules,
            target,
            service: service.into(),
            config,
            rule_version,
            short_circuit,
            json,
        }),

        Commands::Versions { json } => commands::versions::run(json),
    }
}
