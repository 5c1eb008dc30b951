//! `certcheck check` - fetch a URL through the trust engine.

use anyhow::{Context as _, Result};
use certtrust::{
    certificate_failure, RejectionReceiver, SecureTransportFactory, StoreStatus, TrustDecision,
    TrustDecisionCoordinator, TrustError, TrustEvent,
};
use colored::Colorize;
use serde::Serialize;
use std::collections::HashSet;
use std::error::Error as _;
use std::time::Duration;
use tokio::sync::broadcast;

use super::Context;
use crate::cli::args::CheckArgs;
use crate::output::OutputFormat;
use crate::prompt::{PromptMode, TerminalPrompt};

#[derive(Debug, Serialize)]
struct CheckReport {
    url: String,
    status: Option<u16>,
    error: Option<String>,
    store: StoreStatus,
    attempts: u32,
    events: Vec<TrustEvent>,
}

pub async fn execute(ctx: Context, args: CheckArgs) -> Result<()> {
    let url =
        reqwest::Url::parse(&args.url).with_context(|| format!("Invalid URL: {}", args.url))?;
    if url.scheme() != "https" {
        anyhow::bail!(
            "Only https:// URLs go through certificate trust (got {})",
            url.scheme()
        );
    }

    let (authority, mut rejections) = ctx.authority()?;
    let store = authority.store_status();
    if let StoreStatus::Corrupt(reason) = &store {
        eprintln!(
            "{} trusted certificate store is unreadable ({reason}); \
             run `certcheck trust reset` to start over",
            "Warning:".yellow().bold()
        );
    }

    let mode = if args.yes {
        PromptMode::Fixed(TrustDecision::Accepted)
    } else if args.no_prompt {
        PromptMode::Fixed(TrustDecision::Rejected)
    } else {
        PromptMode::Ask
    };
    let coordinator = TrustDecisionCoordinator::new(authority.clone(), TerminalPrompt::new(mode));
    let mut events = coordinator.subscribe();

    let http = SecureTransportFactory::new(authority)
        .socket_factory()?
        .http_client()?;
    let timeout = Duration::from_secs(args.timeout);

    let mut attempts = 1;
    let mut outcome = fetch(&http, &url, timeout).await;
    if outcome.is_err() {
        let trusted = ask_about_rejections(&coordinator, &mut rejections).await;
        if trusted && args.retry {
            attempts += 1;
            outcome = fetch(&http, &url, timeout).await;
        } else if trusted && ctx.output_format == OutputFormat::Pretty {
            println!(
                "{} certificate trusted; run the check again (or pass --retry)",
                "Note:".cyan().bold()
            );
        }
    }

    let failure = outcome.as_ref().err().map(|e| describe_failure(e, &url));
    let report = CheckReport {
        url: url.to_string(),
        status: outcome.as_ref().ok().copied(),
        error: failure.clone(),
        store,
        attempts,
        events: drain(&mut events),
    };

    match ctx.output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Pretty => print_report(&report),
    }

    match failure {
        None => Ok(()),
        Some(failure) => anyhow::bail!("Request to {url} failed: {failure}"),
    }
}

async fn fetch(
    http: &reqwest::Client,
    url: &reqwest::Url,
    timeout: Duration,
) -> std::result::Result<u16, reqwest::Error> {
    let response = http.get(url.clone()).timeout(timeout).send().await?;
    Ok(response.status().as_u16())
}

/// One line for a failed request. Certificate problems are named as such;
/// anything else is the error chain.
fn describe_failure(error: &reqwest::Error, url: &reqwest::Url) -> String {
    match certificate_failure(error) {
        Some(TrustError::HostnameMismatch(_)) => format!(
            "Hostname not verified: the certificate does not cover {}",
            url.host_str().unwrap_or_default()
        ),
        Some(TrustError::ValidationRejected(reason)) => {
            format!("Certificate not trusted: {reason}")
        }
        _ => {
            let mut line = error.to_string();
            let mut source = error.source();
            while let Some(cause) = source {
                line.push_str(": ");
                line.push_str(&cause.to_string());
                source = cause.source();
            }
            line
        }
    }
}

/// Prompt for every certificate rejected so far. Returns whether any became
/// trusted.
async fn ask_about_rejections(
    coordinator: &TrustDecisionCoordinator,
    rejections: &mut RejectionReceiver,
) -> bool {
    let mut seen = HashSet::new();
    let mut trusted = false;

    // one request may handshake with several addresses; ask once per certificate
    while let Some(leaf) = rejections.try_recv() {
        if !seen.insert(leaf.fingerprint().clone()) {
            continue;
        }
        let Some(pending) = coordinator.on_full_rejection(leaf) else {
            continue;
        };

        let (certificate, decision) = pending.wait().await;
        match decision {
            TrustDecision::Accepted => trusted |= coordinator.on_accept(certificate).is_ok(),
            TrustDecision::Rejected => coordinator.on_reject(&certificate),
        }
    }

    trusted
}

fn drain(events: &mut broadcast::Receiver<TrustEvent>) -> Vec<TrustEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

fn print_report(report: &CheckReport) {
    for event in &report.events {
        match event {
            TrustEvent::CertificateTrusted { fingerprint, subject } => println!(
                "{} trusted {} ({})",
                "Trust:".green().bold(),
                subject,
                fingerprint.short()
            ),
            TrustEvent::CertificateRejected { fingerprint } => println!(
                "{} certificate {} left untrusted",
                "Trust:".yellow().bold(),
                fingerprint.short()
            ),
            TrustEvent::TrustFailed { reason, .. } => {
                println!("{} {}", "Trust failed:".red().bold(), reason);
            }
            TrustEvent::PromptAbandoned { reason, .. } => {
                println!("{} {}", "Cannot prompt:".red().bold(), reason);
            }
            TrustEvent::PromptRequested { .. } => {}
        }
    }

    match (&report.status, &report.error) {
        (Some(status), _) => println!(
            "{} {} answered HTTP {}",
            "OK:".green().bold(),
            report.url.cyan(),
            status
        ),
        (None, Some(error)) => println!("{} {}", "Failed:".red().bold(), error),
        (None, None) => {}
    }
}
