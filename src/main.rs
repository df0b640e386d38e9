//! UPack - digital object packaging
//!
//! Inventories, bags, archives and verifies batches of digital objects on their
//! way into a preservation archive.

use clap::Parser;

mod archive;
mod bag;
mod cli;
mod commands;
mod config;
mod error;
mod hash;
mod inspect;
mod inventory;
mod logging;
mod manifest;
mod prepack;
mod sequencer;
mod transaction;
mod transfer;
mod ui;
mod walk;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet);

    let config = cli.config;
    let quiet = cli.quiet;
    let result = match cli.command {
        Commands::Run(args) => commands::run::run(config, quiet, args),
        Commands::Manifest(args) => commands::manifest::run(config, quiet, args),
        Commands::Bag(args) => commands::bag::run(config, quiet, args),
        Commands::VerifyBag(args) => commands::verify_bag::run(config, args),
        Commands::Archive(args) => commands::archive::run(config, quiet, args),
        Commands::Transfer(args) => commands::transfer::run(config, args),
        Commands::Compare(args) => commands::compare::run(args),
        Commands::Version => commands::version::run(),
        Commands::Completions(args) => commands::completions::run(args),
    };

    if let Err(e) = result {
        eprintln!("{:?}", miette::Report::new(e));
        std::process::exit(1);
    }
}
