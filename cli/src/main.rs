//! `cdat`: build and query compressed double-array trie dictionaries.
//!
//! Query commands read one query per line from stdin and write results to
//! stdout; logs go to stderr (set `RUST_LOG` to see them).

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cdat", version)]
#[command(about = "Build and query compressed double-array trie dictionaries")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build an index from newline-delimited keys
    Build {
        /// Key file, or `-` for stdin
        keys: PathBuf,
        /// Output index file
        index: PathBuf,
        /// Trie variant to build
        #[arg(short = 't', long = "type", value_enum, default_value_t = Variant::Trie8)]
        variant: Variant,
    },
    /// Print every stored key that is a prefix of each query
    PrefixSearch {
        /// Index file
        index: PathBuf,
    },
    /// Print every stored key that starts with each query
    PredictiveSearch {
        /// Index file
        index: PathBuf,
        /// Maximum results per query
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Print the id of each query key
    Lookup {
        /// Index file
        index: PathBuf,
    },
    /// Print the key of each query id
    Decode {
        /// Index file
        index: PathBuf,
    },
    /// Print every stored key with its id
    Enumerate {
        /// Index file
        index: PathBuf,
    },
}

/// Trie variant, named by its type id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Variant {
    /// Pointer-based DAC, 7-bit first level
    #[value(name = "7")]
    Trie7,
    /// Standard DAC, 8-bit first level
    #[value(name = "8")]
    Trie8,
    /// Pointer-based DAC, 15-bit first level
    #[value(name = "15")]
    Trie15,
    /// Standard DAC, 16-bit first level
    #[value(name = "16")]
    Trie16,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // Help and version succeed unless they cannot be printed; usage errors exit 1.
        Err(e) => {
            let usage_error = e.use_stderr();
            return match e.print() {
                Ok(()) if !usage_error => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    let result = match cli.command {
        Command::Build { keys, index, variant } => commands::build(&keys, &index, variant),
        Command::PrefixSearch { index } => commands::prefix_search(&index),
        Command::PredictiveSearch { index, limit } => commands::predictive_search(&index, limit),
        Command::Lookup { index } => commands::lookup(&index),
        Command::Decode { index } => commands::decode(&index),
        Command::Enumerate { index } => commands::enumerate(&index),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
