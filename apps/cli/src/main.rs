use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use client_core::{
    load_settings, load_settings_from, ChannelManager, RequestClient, SessionController,
    SessionSnapshot, SessionStatus, Settings, StageTracker,
};
use serde::Deserialize;
use shared::{
    domain::{PersonInput, ProjectRequirements},
    protocol::ResultPayload,
};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod sample;

#[derive(Parser, Debug)]
#[command(name = "teamforge", about = "Drive the team optimizer from the terminal")]
struct Cli {
    /// Settings file; `teamforge.toml` in the working directory when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    api_base_url: Option<String>,
    #[arg(long, global = true)]
    ws_url: Option<String>,
    /// 0 disables the request timeout.
    #[arg(long, global = true)]
    request_timeout_secs: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one optimization attempt and print the outcome.
    Run(RunArgs),
    /// Print the optimizer's health report.
    Health,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// JSON file holding `{ "requirements": {...}, "personnel": [...] }`.
    #[arg(long, required_unless_present = "sample", conflicts_with = "sample")]
    input: Option<PathBuf>,
    /// Use the built-in eight-person pool.
    #[arg(long)]
    sample: bool,
    #[arg(long)]
    project_name: Option<String>,
    #[arg(long)]
    team_size: Option<u32>,
    #[arg(long, value_delimiter = ',')]
    skills: Vec<String>,
    #[arg(long)]
    project_type: Option<String>,
    #[arg(long)]
    priority: Option<String>,
}

#[derive(Deserialize, Debug)]
struct InputFile {
    #[serde(default)]
    requirements: ProjectRequirements,
    personnel: Vec<PersonInput>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();
    let settings = resolve_settings(&cli)?;

    match cli.command {
        Command::Run(args) => {
            let (requirements, personnel) = load_input(&args)?;
            run(&settings, requirements, personnel).await
        }
        Command::Health => health(&settings).await,
    }
}

fn resolve_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = match &cli.config {
        Some(path) => load_settings_from(path),
        None => load_settings(),
    }
    .context("failed to load settings")?;
    if let Some(url) = &cli.api_base_url {
        settings.api_base_url = url.clone();
    }
    if let Some(url) = &cli.ws_url {
        settings.ws_url = Some(url.clone());
    }
    if let Some(secs) = cli.request_timeout_secs {
        settings.request_timeout = client_core::config::timeout_from_secs(secs);
    }
    Ok(settings)
}

fn load_input(args: &RunArgs) -> Result<(ProjectRequirements, Vec<PersonInput>)> {
    let (mut requirements, personnel) = match &args.input {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let input: InputFile = serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            (input.requirements, input.personnel)
        }
        None => (ProjectRequirements::default(), sample::personnel()),
    };

    if args.project_name.is_some() {
        requirements.project_name = args.project_name.clone();
    }
    if args.team_size.is_some() {
        requirements.team_size = args.team_size;
    }
    if !args.skills.is_empty() {
        requirements.skills = args.skills.clone();
    }
    if let Some(project_type) = &args.project_type {
        requirements.project_type = project_type.clone();
    }
    if let Some(priority) = &args.priority {
        requirements.priority = priority.clone();
    }
    Ok((requirements, personnel))
}

async fn health(settings: &Settings) -> Result<()> {
    let client = RequestClient::from_settings(settings).context("invalid api base url")?;
    let report = client
        .health()
        .await
        .with_context(|| format!("health check against {} failed", client.base_url()))?;
    println!("status:    {}", report.status);
    if let Some(system) = &report.system {
        println!("system:    {system}");
    }
    if let Some(version) = &report.version {
        println!("version:   {version}");
    }
    if let Some(agents) = report.agents {
        println!("agents:    {agents}");
    }
    if let Some(timestamp) = &report.timestamp {
        println!("timestamp: {timestamp}");
    }
    Ok(())
}

async fn run(
    settings: &Settings,
    requirements: ProjectRequirements,
    personnel: Vec<PersonInput>,
) -> Result<()> {
    let client = RequestClient::from_settings(settings).context("invalid api base url")?;
    let (channel, events) = ChannelManager::from_settings(settings).context("invalid push url")?;
    let controller = SessionController::new(Arc::new(client));
    let pump = controller.attach_channel(events);
    info!(url = channel.url(), "teamforge: opening push channel");
    channel.connect().await;

    let mut state = controller.subscribe();
    let outcome = match controller.start(&requirements, &personnel).await {
        Ok(attempt) => {
            info!(%attempt, candidates = personnel.len(), "teamforge: attempt started");
            follow(&mut state).await
        }
        Err(err) => Err(anyhow!(err).context("cannot start optimization")),
    };

    channel.teardown().await;
    pump.abort();
    outcome
}

/// Prints stage changes until the session settles, then the outcome.
async fn follow(state: &mut watch::Receiver<SessionSnapshot>) -> Result<()> {
    let mut shown = StageTracker::default();
    loop {
        let snapshot = state.borrow_and_update().clone();
        print_stage_changes(&mut shown, &snapshot.stages);
        match snapshot.status {
            SessionStatus::Completed => {
                if let Some(result) = &snapshot.result {
                    print_result(result);
                }
                return Ok(());
            }
            SessionStatus::Error => {
                let message = snapshot
                    .failure
                    .map(|failure| failure.user_message())
                    .unwrap_or_else(|| "Optimization failed".into());
                return Err(anyhow!(message));
            }
            SessionStatus::Idle | SessionStatus::Running => {}
        }

        tokio::select! {
            changed = state.changed() => changed.context("session controller went away")?,
            _ = tokio::signal::ctrl_c() => return Err(anyhow!("interrupted")),
        }
    }
}

fn print_stage_changes(shown: &mut StageTracker, current: &StageTracker) {
    for (key, entry) in current.iter() {
        if shown.get(key) == entry {
            continue;
        }
        println!(
            "[{:<20}] {:<9} {:>3}%  {}",
            key.label(),
            entry.status.as_str(),
            entry.progress,
            entry.message
        );
    }
    *shown = current.clone();
}

fn print_result(result: &ResultPayload) {
    println!();
    for recommendation in &result.recommendations {
        let score = recommendation
            .overall_score()
            .map(|score| format!("{:.0}%", score * 100.0))
            .unwrap_or_else(|| "n/a".into());
        println!(
            "#{} {} (score {score})",
            recommendation.rank,
            recommendation.member_names().join(", ")
        );
        if let Some(insights) = &recommendation.ai_insights {
            println!("    {insights}");
        }
    }
    if let Some(confidence) = result.metadata.confidence {
        println!("confidence: {:.0}%", confidence * 100.0);
    }
}

#[cfg(test)]
#[path = "tests/cli_tests.rs"]
mod tests;
