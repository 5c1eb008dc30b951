//! `certcheck config` - configuration inspection.

use anyhow::Result;
use colored::Colorize;

use super::Context;
use crate::cli::args::{ConfigArgs, ConfigCommands};
use crate::output::OutputFormat;

pub async fn execute(ctx: Context, args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Show => show_config(&ctx),
        ConfigCommands::Path => {
            println!("{}", ctx.config_path.display());
            Ok(())
        }
        ConfigCommands::Init => init_config(&ctx),
    }
}

fn show_config(ctx: &Context) -> Result<()> {
    let storage_path = ctx.storage_path()?;

    match ctx.output_format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "config_path": ctx.config_path,
                    "storage_path": storage_path,
                    "storage_key": ctx.config.storage_key,
                    "ca_paths": ctx.config.ca_paths,
                }))?
            );
        }
        OutputFormat::Pretty => {
            println!("{}", "Current Configuration:".bold());
            println!();
            println!("  {} {}", "config file:".bold(), ctx.config_path.display());
            println!("  {} {}", "storage_path:".bold(), storage_path.display());
            println!("  {} {}", "storage_key:".bold(), ctx.config.storage_key);
            println!("  {}", "ca_paths:".bold());
            for path in &ctx.config.ca_paths {
                let marker = if path.exists() {
                    "found".green()
                } else {
                    "missing".dimmed()
                };
                println!("    {} ({marker})", path.display());
            }
        }
    }

    Ok(())
}

fn init_config(ctx: &Context) -> Result<()> {
    if ctx.config_path.exists() {
        anyhow::bail!("{} already exists", ctx.config_path.display());
    }
    ctx.config.save(&ctx.config_path)?;
    println!(
        "{} wrote {}",
        "Success:".green().bold(),
        ctx.config_path.display()
    );
    Ok(())
}
