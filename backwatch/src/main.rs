// Backwatch - checks that server backups reached their primary and secondary targets

mod notify;
mod rename;

use anyhow::{Context, Result};
use backwatch_common::report::{batch_messages, format_header, format_server_block};
use backwatch_common::{BackupValidator, BackwatchConfig, TimeFormat};
use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use notify::WebhookNotifier;

#[derive(Parser, Debug)]
#[command(
    name = "backwatch",
    version,
    about = "Verify that scheduled backups landed on both targets"
)]
struct Cli {
    /// Configuration file (default: $BACKWATCH_CONFIG or /etc/backwatch/backwatch.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate every configured server and send the report
    Check {
        /// Print the report instead of posting it to the webhook
        #[arg(long)]
        dry_run: bool,
    },
    /// Re-encode backup filenames in the primary directories to another time format
    Rename {
        /// Target format: rfc3339, unixdate or epoch
        #[arg(long)]
        to: TimeFormat,

        /// Only rename files for this server
        #[arg(long)]
        server: Option<String>,

        /// Rename files instead of only printing the plan
        #[arg(long)]
        apply: bool,
    },
}

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let path = cli.config.unwrap_or_else(BackwatchConfig::default_path);
    log::info!("Config: {}", path.display());

    let config = BackwatchConfig::load(&path)?;
    if let Err(issues) = config.validate() {
        for issue in &issues {
            log::error!("Invalid configuration: {}", issue);
        }
        return Err(anyhow::anyhow!(
            "{} problem(s) in {}",
            issues.len(),
            path.display()
        ));
    }

    match cli.command {
        Command::Check { dry_run } => run_check(&config, dry_run),
        Command::Rename { to, server, apply } => run_rename(&config, to, server.as_deref(), apply),
    }
}

/// Validate each server in order and deliver the report
fn run_check(config: &BackwatchConfig, dry_run: bool) -> Result<()> {
    let validator = BackupValidator::new(config.freshness());
    let run_time = Local::now();
    let now = run_time.with_timezone(&Utc);

    let blocks = check_blocks(config, &validator, now);
    let messages = batch_messages(
        &format_header(run_time),
        &blocks,
        config.servers_per_message,
    );

    let webhook = config
        .discord_webhook_url
        .as_deref()
        .filter(|url| !url.trim().is_empty());

    match webhook {
        Some(url) if !dry_run => {
            let notifier = WebhookNotifier::new(url)?;
            for (idx, message) in messages.iter().enumerate() {
                notifier
                    .send(&config.username, message)
                    .with_context(|| {
                        format!("Failed to send message {} of {}", idx + 1, messages.len())
                    })?;
            }
            log::info!("Sent {} message(s) to webhook", messages.len());
        }
        _ => {
            if !dry_run {
                log::warn!("No webhook configured, printing report");
            }
            println!("{}", messages.join("\n\n"));
        }
    }

    Ok(())
}

/// One report block per configured server, in configuration order
///
/// A server that cannot be checked gets a FAIL block and the others still run.
fn check_blocks(
    config: &BackwatchConfig,
    validator: &BackupValidator,
    now: DateTime<Utc>,
) -> Vec<String> {
    config
        .targets
        .iter()
        .map(|target| {
            log::info!("Checking {}", target.server_name);
            let outcome = validator.validate(target, now);
            if let Err(e) = &outcome {
                log::error!("{}: {}", target.server_name, e);
            }
            format_server_block(&target.server_name, &outcome, now)
        })
        .collect()
}

/// Print (and optionally apply) filename re-encodings
fn run_rename(
    config: &BackwatchConfig,
    to: TimeFormat,
    server: Option<&str>,
    apply: bool,
) -> Result<()> {
    let targets: Vec<_> = match server {
        Some(name) => vec![
            config
                .target(name)
                .ok_or_else(|| anyhow::anyhow!("No server named '{}' in configuration", name))?,
        ],
        None => config.targets.iter().collect(),
    };

    for target in targets {
        println!("{}", target.server_name);

        let plans = match rename::plan_renames(target, to) {
            Ok(plans) => plans,
            Err(e) => {
                log::error!("Could not plan renames for {}: {:#}", target.server_name, e);
                continue;
            }
        };

        for plan in &plans {
            println!(
                "  {} -> {}",
                rename::display_name(&plan.from),
                rename::display_name(&plan.to)
            );
        }

        if apply {
            let renamed = rename::apply_renames(&plans)?;
            log::info!(
                "{}: renamed {} of {} file(s)",
                target.server_name,
                renamed,
                plans.len()
            );
        }
    }

    Ok(())
}
