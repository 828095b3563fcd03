//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum, ValueHint};

/// Tumor subclone tree compatibility: can one clonal tree have been derived from another?
#[derive(Parser, Debug)]
#[command(name = "treemerge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug output, repeat for more (-d info, -dd debug, -ddd trace)
    #[arg(short = 'd', long = "debug", action = clap::ArgAction::Count, global = true)]
    pub debug: u8,

    /// Breakpoint tolerance in base pairs (overrides config)
    #[arg(short = 'r', long, global = true)]
    pub resolution: Option<u64>,

    /// Skip sibling and inheritance checks when loading trees
    #[arg(long, global = true)]
    pub no_validate: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check whether Q is compatible with reference tree P (exit 0 yes, 1 no)
    Check {
        /// Reference tree: document path or <db>#<id>
        p: String,
        /// Tree to explain: document path or <db>#<id>
        q: String,
        /// Print per-node placement diagnostics
        #[arg(short, long)]
        explain: bool,
    },

    /// Compare every tree of SET1 with every tree of SET2, print compatible pairs
    Pairs {
        /// Reference trees: directory of documents or tree database
        #[arg(value_hint = ValueHint::AnyPath)]
        set1: PathBuf,
        /// Trees to explain: directory of documents or tree database
        #[arg(value_hint = ValueHint::AnyPath)]
        set2: PathBuf,
        /// Also print incompatible pairs
        #[arg(short, long)]
        all: bool,
    },

    /// Render a tree
    Show {
        /// Document path or <db>#<id>
        source: String,
    },

    /// Archive tree documents into a database
    Import {
        /// Tree documents (.toml, .json)
        #[arg(required = true, value_hint = ValueHint::FilePath)]
        files: Vec<PathBuf>,
        /// Target database (default: configured database)
        #[arg(long, value_hint = ValueHint::FilePath)]
        db: Option<PathBuf>,
    },

    /// Print a tree as a document
    Export {
        /// Document path or <db>#<id>
        source: String,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Toml)]
        format: ExportFormat,
    },

    /// List trees stored in a database
    List {
        /// Tree database (default: configured database)
        #[arg(value_hint = ValueHint::FilePath)]
        db: Option<PathBuf>,
    },

    /// Rename a stored tree
    Rename {
        /// <db>#<id>
        source: String,
        /// New name (omit to clear)
        name: Option<String>,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Toml,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective settings
    Show,
    /// Show config file locations
    Path,
    /// Write a commented template config
    Init {
        /// Write the global config instead of ./.treemerge.toml
        #[arg(short, long)]
        global: bool,
    },
}
