//! # certtrust-cli
//!
//! Command-line front end for the certtrust engine.
//!
//! ## Features
//!
//! - **check**: fetch an HTTPS URL, asking whether to trust an unknown
//!   certificate and optionally retrying once it is trusted
//! - **trust**: list, add, remove and reset trusted certificates
//! - **config**: show the active configuration and where it lives
//! - **Output formats**: colored text or JSON

pub mod cli;
pub mod config;
pub mod output;
pub mod prompt;

pub use cli::run;
