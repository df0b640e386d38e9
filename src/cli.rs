//! CLI definitions using clap derive API

use clap::builder::{Styles, styling::AnsiColor};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::archive::Compression;
use crate::config::CONFIG_ENV;
use crate::sequencer::Stage;

/// UPack - digital object packaging
///
/// Inventories, bags, archives and verifies batches of digital objects
/// before they are transferred into a preservation archive.
#[derive(Parser, Debug)]
#[command(
    name = "upack",
    author,
    version,
    styles = Styles::styled()
        .header(AnsiColor::Green.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default().bold())
        .placeholder(AnsiColor::Cyan.on_default()),
    about = "Prepare batches of digital objects for transfer into a preservation archive",
    long_about = "UPack walks a batch directory in which every subdirectory is one digital \
                  object. It writes a checksum inventory per object, turns each object into a \
                  BagIt bag, tars every object into a sibling '<batch>-tarred' directory, and \
                  writes batch-wide transfer manifests that prove nothing changed in transit.",
    after_help = "\x1b[1m\x1b[32mExamples:\x1b[0m\n    \
                  upack run ./batch\n    \
                  upack run ./batch --stages manifest,bag --step\n    \
                  upack transfer ./batch-tarred\n    \
                  upack transfer /mnt/archive/batch-tarred --against Transfer_batch-tarred_20240305_140709.csv\n    \
                  upack verify-bag ./batch/obj1"
)]
pub struct Cli {
    /// Configuration file (YAML)
    #[arg(long, short = 'c', global = true, env = CONFIG_ENV)]
    pub config: Option<PathBuf>,

    /// Show debug logging
    #[arg(long, short = 'v', global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only show warnings and errors, and no progress bars
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run pipeline stages over a batch
    Run(RunArgs),

    /// Write an inventory manifest into each object
    Manifest(ManifestArgs),

    /// Turn each object into a BagIt bag
    Bag(BagArgs),

    /// Check existing bags
    VerifyBag(VerifyBagArgs),

    /// Tar each object into '<batch>-tarred'
    Archive(ArchiveArgs),

    /// Write a transfer manifest, optionally checking it against an earlier one
    Transfer(TransferArgs),

    /// Compare two manifest files
    Compare(CompareArgs),

    /// Show version information
    Version,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Batch-wide answers that would otherwise be asked
#[derive(Args, Debug, Clone, Default)]
pub struct DecisionArgs {
    /// Regenerate manifests that already exist (all of them)
    #[arg(long, conflicts_with = "keep_existing")]
    pub overwrite: bool,

    /// Keep every existing manifest without asking
    #[arg(long)]
    pub keep_existing: bool,

    /// Bag objects that are already bags (nests the old bag)
    #[arg(long)]
    pub rebag: bool,

    /// Ask before overwriting, re-bagging and between stages
    #[arg(long, short = 'i')]
    pub interactive: bool,
}

/// Arguments for the run command
#[derive(Args, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Inventory, bag and archive every object:\n    upack run ./batch\n\n\
                  Only some stages (always run in pipeline order):\n    upack run ./batch --stages bag,manifest\n\n\
                  Everything, including the transfer manifest:\n    upack run ./batch --stages prepack,manifest,bag,archive,transfer\n\n\
                  Confirm each stage before the next:\n    upack run ./batch --step")]
pub struct RunArgs {
    /// Batch directory; every subdirectory is one object
    pub batch: PathBuf,

    /// Stages to run
    #[arg(long, short = 's', value_enum, value_delimiter = ',', default_values_t = Stage::defaults())]
    pub stages: Vec<Stage>,

    /// Pause after every stage to continue, skip the next stage or abort
    #[arg(long)]
    pub step: bool,

    #[command(flatten)]
    pub decisions: DecisionArgs,

    /// Archive compression
    #[arg(long, value_enum)]
    pub compression: Option<Compression>,

    /// Hashing threads (0 = one per CPU)
    #[arg(long, short = 'j')]
    pub threads: Option<usize>,

    /// Print the final report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the manifest command
#[derive(Args, Debug)]
pub struct ManifestArgs {
    /// Batch directory
    pub batch: PathBuf,

    #[command(flatten)]
    pub decisions: DecisionArgs,

    /// Hashing threads (0 = one per CPU)
    #[arg(long, short = 'j')]
    pub threads: Option<usize>,
}

/// Arguments for the bag command
#[derive(Args, Debug)]
pub struct BagArgs {
    /// Batch directory
    pub batch: PathBuf,

    #[command(flatten)]
    pub decisions: DecisionArgs,
}

/// Arguments for the verify-bag command
#[derive(Args, Debug)]
pub struct VerifyBagArgs {
    /// Bags to check; a directory that is not a bag is checked object by object
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

/// Arguments for the archive command
#[derive(Args, Debug)]
pub struct ArchiveArgs {
    /// Batch directory
    pub batch: PathBuf,

    /// Archive compression
    #[arg(long, value_enum)]
    pub compression: Option<Compression>,
}

/// Arguments for the transfer command
#[derive(Args, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Before the move:\n    upack transfer ./batch-tarred\n\n\
                  After the move, check against the first manifest:\n    \
                  upack transfer /mnt/batch-tarred --against ./Transfer_batch-tarred_20240305_140709.csv")]
pub struct TransferArgs {
    /// Directory to describe
    pub root: PathBuf,

    /// Earlier transfer manifest to compare the new one against
    #[arg(long, value_name = "MANIFEST")]
    pub against: Option<PathBuf>,

    /// Print the comparison as JSON
    #[arg(long, requires = "against")]
    pub json: bool,
}

/// Arguments for the compare command
#[derive(Args, Debug)]
pub struct CompareArgs {
    /// Manifest written before the transfer
    pub before: PathBuf,

    /// Manifest written after the transfer
    pub after: PathBuf,

    /// Print the comparison as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for completions command
#[derive(Args, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Generate bash completions:\n    upack completions --shell bash > ~/.bash_completion.d/upack\n\n\
                  Generate zsh completions:\n    upack completions --shell zsh > ~/.zfunc/_upack\n\n\
                  Generate fish completions:\n    upack completions --shell fish > ~/.config/fish/completions/upack.fish")]
pub struct CompletionsArgs {
    /// Shell type (bash, elvish, fish, powershell, zsh)
    #[arg(long)]
    pub shell: String,
}
