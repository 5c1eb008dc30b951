//! `certcheck trust` - manage trusted certificates.

use anyhow::{Context as _, Result};
use certtrust::StoreStatus;
use certtrust_core::{Certificate, Fingerprint};
use colored::Colorize;
use dialoguer::Confirm;

use super::Context;
use crate::cli::args::{TrustArgs, TrustCommands};
use crate::output::{print_entry, EntryView, OutputFormat};

pub async fn execute(ctx: Context, args: TrustArgs) -> Result<()> {
    match args.command {
        TrustCommands::List => list(&ctx),
        TrustCommands::Add { file } => add(&ctx, &file),
        TrustCommands::Remove { fingerprint } => remove(&ctx, &fingerprint),
        TrustCommands::Reset { force } => reset(&ctx, force),
    }
}

fn list(ctx: &Context) -> Result<()> {
    let (authority, _) = ctx.authority()?;
    let status = authority.store_status();
    let entries: Vec<EntryView> = authority
        .trusted_certificates()
        .iter()
        .map(EntryView::from)
        .collect();

    match ctx.output_format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "store": status,
                    "certificates": entries,
                }))?
            );
        }
        OutputFormat::Pretty => {
            if let StoreStatus::Corrupt(reason) = &status {
                println!("{} store is unreadable: {reason}", "Warning:".yellow().bold());
                println!("Run `certcheck trust reset` to discard it.");
                return Ok(());
            }
            if entries.is_empty() {
                println!("{}", "No trusted certificates.".dimmed());
            }
            for view in &entries {
                print_entry(view);
            }
        }
    }

    Ok(())
}

fn add(ctx: &Context, file: &std::path::Path) -> Result<()> {
    let pem = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let certificates = Certificate::from_pem(&pem)?;
    if certificates.is_empty() {
        anyhow::bail!("No certificates found in {}", file.display());
    }

    let (authority, _) = ctx.authority()?;
    for certificate in certificates {
        let subject = certificate.subject().to_string();
        let fingerprint = authority.trust(certificate)?;
        match ctx.output_format {
            OutputFormat::Json => println!("{}", serde_json::json!({ "trusted": fingerprint })),
            OutputFormat::Pretty => println!(
                "{} trusted {} ({})",
                "Success:".green().bold(),
                subject,
                fingerprint.short()
            ),
        }
    }

    Ok(())
}

fn remove(ctx: &Context, fingerprint: &str) -> Result<()> {
    let fingerprint: Fingerprint = fingerprint.parse()?;
    let (authority, _) = ctx.authority()?;

    if !authority.untrust(&fingerprint)? {
        anyhow::bail!("Certificate {fingerprint} is not trusted");
    }

    match ctx.output_format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "removed": fingerprint })),
        OutputFormat::Pretty => println!(
            "{} certificate {} is no longer trusted",
            "Success:".green().bold(),
            fingerprint.short()
        ),
    }
    Ok(())
}

fn reset(ctx: &Context, force: bool) -> Result<()> {
    if !force {
        let confirmed = Confirm::new()
            .with_prompt("Forget every trusted certificate?")
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Nothing changed.");
            return Ok(());
        }
    }

    let (authority, _) = ctx.authority()?;
    authority.reset_store()?;

    match ctx.output_format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "reset": true })),
        OutputFormat::Pretty => println!("{} trusted store reset", "Success:".green().bold()),
    }
    Ok(())
}
