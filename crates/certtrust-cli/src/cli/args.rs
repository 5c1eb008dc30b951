//! Command-line argument definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::output::OutputFormat;

/// Check HTTPS endpoints and manage trusted certificates
///
/// Certificates that no system CA vouches for can be trusted on first use;
/// certcheck remembers the decision for later runs.
#[derive(Parser, Debug)]
#[command(name = "certcheck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (defaults to the per-user config directory)
    #[arg(short, long, env = "CERTCHECK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum)]
    pub output: Option<OutputFormat>,

    /// Increase verbosity
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch an HTTPS URL through the trust engine
    Check(CheckArgs),

    /// Manage trusted certificates
    Trust(TrustArgs),

    /// Show configuration
    Config(ConfigArgs),
}

// ============================================================================
// Check command
// ============================================================================

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// URL to fetch (https://...)
    pub url: String,

    /// Repeat the request once after a certificate is trusted
    #[arg(long)]
    pub retry: bool,

    /// Trust unknown certificates without asking
    #[arg(short = 'y', long, conflicts_with = "no_prompt")]
    pub yes: bool,

    /// Never ask; unknown certificates stay untrusted
    #[arg(long)]
    pub no_prompt: bool,

    /// Request timeout in seconds
    #[arg(long, default_value = "15")]
    pub timeout: u64,
}

// ============================================================================
// Trust command
// ============================================================================

#[derive(Args, Debug)]
pub struct TrustArgs {
    #[command(subcommand)]
    pub command: TrustCommands,
}

#[derive(Subcommand, Debug)]
pub enum TrustCommands {
    /// List trusted certificates
    List,

    /// Trust every certificate in a PEM file
    Add {
        /// PEM file containing one or more certificates
        file: PathBuf,
    },

    /// Stop trusting a certificate
    Remove {
        /// SHA-256 fingerprint (hex, colons allowed)
        fingerprint: String,
    },

    /// Discard all trusted certificates, including an unreadable store
    Reset {
        /// Do not ask for confirmation
        #[arg(short, long)]
        force: bool,
    },
}

// ============================================================================
// Config command
// ============================================================================

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the active configuration
    Show,

    /// Print the configuration file path
    Path,

    /// Write the active configuration to the configuration file
    Init,
}
