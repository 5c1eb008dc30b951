//! Output formatting for different formats.

use certtrust_core::{CertificateSummary, TrustedEntry};
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;

/// Available output formats.
#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text with colors
    #[default]
    Pretty,
    /// JSON output
    Json,
}

/// JSON shape of a trusted certificate.
#[derive(Debug, Serialize)]
pub struct EntryView {
    pub fingerprint: String,
    pub subject: String,
    pub issuer: String,
    pub alt_names: Vec<String>,
    pub trusted_at: chrono::DateTime<chrono::Utc>,
}

impl From<&TrustedEntry> for EntryView {
    fn from(entry: &TrustedEntry) -> Self {
        let cert = &entry.certificate;
        Self {
            fingerprint: cert.fingerprint().to_string(),
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            alt_names: cert
                .alt_names()
                .map(|names| names.iter().map(ToString::to_string).collect())
                .unwrap_or_default(),
            trusted_at: entry.trusted_at,
        }
    }
}

/// Print one trusted certificate as text.
pub fn print_entry(view: &EntryView) {
    println!("{}", view.fingerprint.cyan());
    println!("  {} {}", "Subject:".bold(), view.subject);
    println!("  {} {}", "Issuer:".bold(), view.issuer);
    if !view.alt_names.is_empty() {
        println!("  {} {}", "Names:".bold(), view.alt_names.join(", "));
    }
    println!(
        "  {} {}",
        "Trusted:".bold(),
        view.trusted_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
}

/// Print what the trust prompt is asking about.
pub fn print_summary(summary: &CertificateSummary) {
    println!("{}", "The server presented a certificate nobody vouches for.".yellow().bold());
    println!("  {} {}", "Subject:".bold(), summary.subject);
    println!("  {} {}", "Issuer:".bold(), summary.issuer);
    let mut names = summary.alt_name_lines().peekable();
    if names.peek().is_some() {
        println!("  {}", "Valid for:".bold());
        for name in names {
            println!("    {name}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_names_come_from_clap() {
        let names: Vec<_> = OutputFormat::value_variants()
            .iter()
            .filter_map(|format| format.to_possible_value())
            .map(|value| value.get_name().to_string())
            .collect();
        assert_eq!(names, ["pretty", "json"]);

        assert_eq!(OutputFormat::from_str("JSON", true), Ok(OutputFormat::Json));
        assert!(OutputFormat::from_str("yaml", true).is_err());
    }
}
