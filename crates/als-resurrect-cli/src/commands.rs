use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "als-resurrect")]
#[command(about = "Bring missing samples back into Ableton Live sets", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Repair a single .als project
    Repair {
        /// Path to the .als archive
        project: PathBuf,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Repair every project listed (one path per line) in a file
    Batch {
        /// File with one .als path per line
        list: PathBuf,
        #[command(flatten)]
        output: OutputArgs,
        /// Number of projects repaired in parallel
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Print configuration values
    PrintConfig,
}

#[derive(Debug, Args)]
pub struct OutputArgs {
    /// Symlink recovered samples instead of copying them
    #[arg(long)]
    pub symlink: bool,
    /// Leave the original archive untouched and write `<name>-🐰.als` next to it
    #[arg(long)]
    pub keep_original: bool,
}
