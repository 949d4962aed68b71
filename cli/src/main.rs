//! `quorum`: validate governance configs and replay proposal scripts.

mod config;
mod error;
mod script;

use anyhow::Context;
use clap::Parser;
use config::GovernanceConfig;
use quorum_governance::GovernanceRegistry;
use quorum_utils::{init_logging, LogFormat};
use script::{FinalState, Replay, ReplayReport};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "quorum", about = "Quorum governance over an upgrade capability")]
struct Cli {
    /// Log level: "trace", "debug", "info", "warn", "error".
    /// Overrides the config file's `log_level`.
    #[arg(long, global = true, env = "QUORUM_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json". Overrides the config file's `log_format`.
    #[arg(long, global = true, env = "QUORUM_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Validate a config and show the instance it creates.
    Check {
        /// Path to the TOML governance config.
        #[arg(long, env = "QUORUM_CONFIG")]
        config: PathBuf,
    },
    /// Create the configured instance and replay a JSON step script on it.
    Replay {
        #[arg(long, env = "QUORUM_CONFIG")]
        config: PathBuf,

        /// Path to the JSON script.
        #[arg(long)]
        script: PathBuf,

        /// Stop at the first rejected step.
        #[arg(long)]
        fail_fast: bool,

        /// Print one JSON object per step instead of text.
        #[arg(long)]
        json: bool,
    },
}

impl Command {
    fn config_path(&self) -> &PathBuf {
        match self {
            Self::Check { config } | Self::Replay { config, .. } => config,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = GovernanceConfig::from_toml_file(cli.command.config_path())?;
    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    init_logging(cli.log_format.unwrap_or(config.log_format), level)?;
    tracing::info!(config = %cli.command.config_path().display(), "loaded config");

    match cli.command {
        Command::Check { .. } => check(&config),
        Command::Replay {
            script,
            fail_fast,
            json,
            ..
        } => {
            let steps = script::load_script(&script)?;
            tracing::info!(steps = steps.len(), script = %script.display(), "replaying script");
            let report = Replay::new(&config)?.run(&steps, fail_fast)?;
            print_report(&report, json)?;
            if fail_fast && report.rejected() > 0 {
                anyhow::bail!("replay stopped at a rejected step");
            }
            Ok(())
        }
    }
}

fn check(config: &GovernanceConfig) -> anyhow::Result<()> {
    config.validate()?;
    let registry = GovernanceRegistry::new();
    let publisher = config
        .voters
        .first()
        .copied()
        .context("config lists no voters")?;
    let id = registry.create_instance(
        &publisher,
        config.capability(),
        config.required_votes,
        config.voters.iter().copied(),
    )?;
    let instance = registry.instance(id)?;

    println!("instance        {id}");
    println!(
        "threshold       {} of {}",
        instance.required_votes,
        instance.voters.len()
    );
    for voter in &instance.voters {
        println!("voter           {voter}");
    }
    println!("package         {}", config.package);
    println!("upgrade policy  {}", config.upgrade_policy);
    if instance.voters.len() < config.voters.len() {
        tracing::warn!(
            listed = config.voters.len(),
            distinct = instance.voters.len(),
            "duplicate voters in config were collapsed"
        );
    }
    Ok(())
}

fn print_report(report: &ReplayReport, json: bool) -> anyhow::Result<()> {
    if json {
        for step in &report.steps {
            println!("{}", serde_json::to_string(step)?);
        }
        println!("{}", serde_json::to_string(&report.final_state)?);
        return Ok(());
    }

    println!("instance {}", report.instance_id);
    for step in &report.steps {
        let status = match &step.error {
            None => "ok".to_string(),
            Some(error) => format!("rejected: {error}"),
        };
        println!("[{}] {} by {}: {status}", step.index, step.step, step.sender);
        if let Some(detail) = &step.detail {
            println!("    {detail}");
        }
        for event in &step.events {
            println!("    event {}", serde_json::to_string(event)?);
        }
    }

    match &report.final_state {
        FinalState::Governed {
            instance,
            package,
            version,
            policy,
        } => {
            println!(
                "final: {} of {} voters required, package {package} v{version} ({policy})",
                instance.required_votes,
                instance.voters.len()
            );
            if let Some(digest) = &instance.action_in_flight {
                println!("       action {digest} authorized but not committed");
            }
        }
        FinalState::Relinquished {
            owner,
            package,
            version,
        } => println!("final: relinquished to {owner}, package {package} v{version}"),
    }
    println!("{} of {} steps rejected", report.rejected(), report.steps.len());
    Ok(())
}
