mod apply;
mod browser;
mod career;
mod cli;
mod config;
mod discovery;
mod errors;
mod export;
mod llm_client;
mod models;
mod personalizer;
mod scrapers;
mod state;

use chrono::Local;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::Cli;
use crate::config::Config;
use crate::errors::AppError;
use crate::models::{AttemptStatus, CandidateProfile, JobPosting};
use crate::state::AppState;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Configuration first; logging depends on RUST_LOG from it
    let config = match Config::from_env().and_then(|config| config.with_cli(cli)) {
        Ok(config) => config,
        Err(e) => {
            let err = AppError::Config(format!("{e:#}"));
            eprintln!("{err}");
            std::process::exit(err.exit_code());
        }
    };

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run(config).await {
        error!("{e}");
        std::process::exit(e.exit_code());
    }
}

async fn run(config: Config) -> Result<(), AppError> {
    info!("Starting jobhunt v{}", env!("CARGO_PKG_VERSION"));

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping the run");
                cancel.cancel();
            }
        }
    });

    let state = AppState::new(config)?;
    let config = &state.config;

    let postings = match &config.jobs_file {
        Some(path) => export::load_postings(path).await?,
        None => {
            info!("--- Phase 1: Resume analysis and role suggestion ---");
            let cv_text = personalizer::extract_text(&config.resume_path).await?;
            let roles = personalizer::suggest_or_default(
                state.titles.as_ref(),
                &cv_text,
                config.num_titles,
            )
            .await;

            info!("--- Phase 2: Discovery ---");
            let discovery = state
                .orchestrator()
                .discover(
                    &roles,
                    &config.locations,
                    config.max_results_per_combination,
                    &cancel,
                )
                .await?;
            export::write_postings(&config.output_dir, &discovery.postings, Local::now()).await?;
            discovery.postings
        }
    };

    if !config.apply {
        info!("Application phase not requested (use --apply or --dry-run)");
        return Ok(());
    }

    info!("--- Phase 3: Applications ---");
    let profile = CandidateProfile::load(&config.profile_path)?;
    apply_to_postings(&state, profile, &postings, &cancel).await
}

/// Resolves and applies to `max_applications` postings starting at
/// `job_index`, one at a time, then records every attempt.
async fn apply_to_postings(
    state: &AppState,
    profile: CandidateProfile,
    postings: &[JobPosting],
    cancel: &CancellationToken,
) -> Result<(), AppError> {
    let config = &state.config;
    let selected: Vec<&JobPosting> = postings
        .iter()
        .skip(config.job_index)
        .take(config.max_applications)
        .collect();
    if selected.is_empty() {
        warn!(
            "No posting at index {} ({} postings available)",
            config.job_index,
            postings.len()
        );
        return Ok(());
    }

    let resolver = state.resolver();
    let engine = state.engine(profile);
    let mut attempts = Vec::with_capacity(selected.len());

    for posting in selected {
        if cancel.is_cancelled() {
            break;
        }
        info!(
            title = %posting.title,
            company = %posting.company,
            url = %posting.url,
            "Applying"
        );
        let resolution = tokio::select! {
            _ = cancel.cancelled() => break,
            resolution = resolver.resolve(posting) => resolution,
        };
        let report = engine.apply(posting, &resolution, cancel).await;
        attempts.push(report.attempt);
    }

    let count = |status: AttemptStatus| attempts.iter().filter(|a| a.status() == status).count();
    info!(
        "Applications finished: {} submitted, {} failed, {} left for manual review",
        count(AttemptStatus::Submitted),
        count(AttemptStatus::Failed),
        count(AttemptStatus::SkippedManualReview)
    );
    export::write_attempts(&config.output_dir, &attempts, Local::now()).await?;

    if cancel.is_cancelled() {
        return Err(AppError::Cancelled);
    }
    Ok(())
}
