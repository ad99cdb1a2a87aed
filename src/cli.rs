use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fileswap")]
#[command(about = "Streaming literal search/replace across file sets")]
#[command(long_about = "fileswap rewrites every exact occurrence of a literal string in a set of files.

Files are streamed in fixed-size chunks, so they never need to fit in memory.
Each rewritten file is written to a temporary file next to it and renamed over
the original only after the whole output was written successfully. Files
without a match are never touched.

EXAMPLES:
  fileswap replace --find foo --replace bar src/
  fileswap replace --find 1.2.3 --replace 1.2.4 -I '**/*.toml' .
  fileswap replace --find TODO --replace '' --dry-run docs/
  fileswap replace --find a --replace b --keep-going dir1 dir2
  fileswap config --show")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(propagate_version = true)]
struct Cli {
    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log debug output
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace a literal string in every selected file
    #[command(long_about = "Replace a literal string in every selected file.

Each DIR is a file set. Without --include every file below it is selected;
with --include only matching files (and the contents of matching
directories) are. Patterns are matched against paths relative to DIR.

EXAMPLES:
  fileswap replace --find foo --replace bar src/
  fileswap replace --find foo --replace bar -I '**/*.rs' -X 'target/**' .")]
    Replace {
        /// Literal text to search for (must not be empty)
        #[arg(short, long, value_name = "TEXT")]
        find: Option<String>,

        /// Literal replacement text (may be empty)
        #[arg(short, long, value_name = "TEXT", allow_hyphen_values = true)]
        replace: Option<String>,

        /// Directories to process, one file set each
        #[arg(value_name = "DIR")]
        dirs: Vec<PathBuf>,

        /// Glob of files or directories to include (repeatable)
        #[arg(short = 'I', long = "include", value_name = "GLOB")]
        includes: Vec<String>,

        /// Glob of files or directories to exclude (repeatable)
        #[arg(short = 'X', long = "exclude", value_name = "GLOB")]
        excludes: Vec<String>,

        /// Log every file as it is searched
        #[arg(short, long)]
        verbose: bool,

        /// Log failures and continue instead of aborting
        #[arg(short = 'k', long = "keep-going")]
        keep_going: bool,

        /// Count matches without modifying any file
        #[arg(short = 'd', long = "dry-run")]
        dry_run: bool,

        /// Bytes read per chunk (overrides config)
        #[arg(long, value_name = "BYTES")]
        chunk_size: Option<usize>,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show configuration
    #[command(long_about = "Show the fileswap configuration.

The configuration lives in ~/.fileswap/config.toml and is created with
commented defaults on first use.

CONFIGURATION OPTIONS:
  [replace]
    chunk_size = 16384     # Bytes read per chunk
    fail_on_error = true   # Abort on the first failure
    verbose = false        # Log every file

  [logging]
    debug = false          # Append to ~/.fileswap/fileswap.log")]
    Config {
        /// Print the effective configuration
        #[arg(long)]
        show: bool,

        /// Print the configuration file path
        #[arg(long)]
        path: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceArgs {
    pub find: Option<String>,
    pub replace: Option<String>,
    pub dirs: Vec<PathBuf>,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
    pub verbose: bool,
    pub keep_going: bool,
    pub dry_run: bool,
    pub chunk_size: Option<usize>,
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Args {
    Replace(ReplaceArgs),
    Config { show: bool, path: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalArgs {
    pub quiet: bool,
    pub debug: bool,
}

pub fn parse_args() -> Result<(GlobalArgs, Args)> {
    Ok(convert(Cli::parse()))
}

fn convert(cli: Cli) -> (GlobalArgs, Args) {
    let global = GlobalArgs {
        quiet: cli.quiet,
        debug: cli.debug,
    };

    let args = match cli.command {
        Commands::Replace {
            find,
            replace,
            dirs,
            includes,
            excludes,
            verbose,
            keep_going,
            dry_run,
            chunk_size,
            json,
        } => Args::Replace(ReplaceArgs {
            find,
            replace,
            dirs,
            includes,
            excludes,
            verbose,
            keep_going,
            dry_run,
            chunk_size,
            json,
        }),
        Commands::Config { show, path } => Args::Config { show, path },
    };

    (global, args)
}
