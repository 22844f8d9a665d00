// src/main.rs

mod analysis_client;
mod api_keys;
mod approach_overlay;
mod config;
mod error;
mod image_set;
mod session;
mod submission;
mod timing;
mod types;

use analysis_client::AnalysisClient;
use anyhow::Result;
use error::SubmissionError;
use session::{Permission, Session};
use std::path::Path;
use submission::{SubmissionOrchestrator, SubmissionState, SubmitOutcome};
use tracing::{debug, error, info, warn};
use types::{Config, IntersectionSnapshot, APPROACH_COUNT};

#[tokio::main]
async fn main() -> Result<()> {
    let mut config = Config::load("config.yaml")?;

    // Environment overrides, mainly for pointing at a different analysis
    // server without editing the YAML.
    if let Ok(url) = std::env::var("ANALYSIS_SERVER_URL") {
        config.server.url = url;
    }
    if let Ok(key) = std::env::var("ANALYSIS_API_KEY") {
        config.server.api_key = key;
    }

    tracing_subscriber::fmt()
        .with_env_filter(format!("signal_timing={}", config.logging.level))
        .init();

    info!("🚦 Intersection Signal Timing Client Starting");
    info!("✓ Configuration loaded");

    let mut session = Session::with_builtin_users();
    let Some(operator) = session.login_with_email(&config.session.login_email) else {
        error!("Unknown operator email: {}", config.session.login_email);
        return Ok(());
    };
    info!(
        "✓ Logged in as {} ({})",
        operator.name,
        operator.role.as_str()
    );
    info!(
        "  Operator key: {}",
        api_keys::format_api_key(&operator.api_key, true)
    );
    if session.is_admin() {
        info!("  Admin session: timing submissions enabled");
    }

    if !session.has_permission(Permission::Edit) {
        error!(
            "Operator {} has view-only access and cannot submit timing changes",
            operator.email
        );
        return Ok(());
    }

    let client = AnalysisClient::new(&config.server)?;
    info!("✓ Analysis client ready");
    info!("📡 Analysis server: {}", config.server.url);
    if !config.server.api_key.is_empty() {
        if api_keys::validate_api_key(&config.server.api_key) {
            info!(
                "  Server key: {}",
                api_keys::format_api_key(&config.server.api_key, true)
            );
        } else {
            warn!("⚠️ Configured server API key does not match the expected key format");
        }
    }

    let images = image_set::load_approach_images(Path::new(&config.images.input_dir))?;
    if images.is_empty() {
        error!("No approach images found in {}", config.images.input_dir);
        return Ok(());
    }
    info!(
        "Found {} approach image(s) in {}",
        images.len(),
        config.images.input_dir
    );
    for image in &images {
        let (width, height) = image.dimensions();
        debug!("  {} ({}x{})", image.name, width, height);
    }

    let mut orchestrator = SubmissionOrchestrator::new(config.timing.clone());
    orchestrator.select_images(images);

    match orchestrator.submit(&client).await {
        SubmitOutcome::Committed => {
            let Some(snapshot) = orchestrator.snapshot() else {
                return Ok(());
            };

            if session.has_permission(Permission::View) {
                info!("\n========================================");
                info!("Green light plan");
                info!("========================================");
                for (idx, approach) in snapshot.approaches.iter().enumerate() {
                    info!(
                        "  Approach {}: {} vehicle(s) → {}s green",
                        idx + 1,
                        approach.count,
                        snapshot.green_seconds[idx]
                    );
                }
            }

            std::fs::create_dir_all(&config.render.output_dir)?;
            let jsonl_path = Path::new(&config.render.output_dir).join("submissions.jsonl");
            let mut results_file = std::fs::File::options()
                .create(true)
                .append(true)
                .open(&jsonl_path)?;
            save_submission_record(snapshot, &operator.email, &mut results_file)?;

            if config.render.save_annotated {
                approach_overlay::save_annotated_set(
                    orchestrator.images(),
                    snapshot,
                    &config.render,
                )?;
            }
        }
        SubmitOutcome::Ignored => {}
        SubmitOutcome::Rejected(err) => {
            match &err {
                SubmissionError::AuthenticationFailed => {
                    warn!("Check server.api_key in config.yaml or ANALYSIS_API_KEY")
                }
                SubmissionError::NetworkUnreachable(_) => {
                    warn!("Is the analysis server running at {}?", config.server.url)
                }
                SubmissionError::InvalidInputCount { actual } => warn!(
                    "Exactly {} approach images are required, found {} in {}",
                    APPROACH_COUNT, actual, config.images.input_dir
                ),
                _ => {}
            }
        }
    }

    orchestrator.log_summary();
    if orchestrator.state() == SubmissionState::Failed {
        orchestrator.reset_to_idle();
        info!(
            "Reset to {} for the next attempt",
            orchestrator.state().as_str()
        );
    }

    if let Some(user) = session.current_user() {
        debug!("Logging out {}", user.email);
    }
    session.logout();

    Ok(())
}

fn save_submission_record(
    snapshot: &IntersectionSnapshot,
    operator_email: &str,
    file: &mut std::fs::File,
) -> Result<()> {
    use std::io::Write;

    let record = serde_json::json!({
        "submission_id": snapshot.submission_id,
        "committed_at": snapshot.committed_at.to_rfc3339(),
        "operator": operator_email,
        "vehicle_counts": snapshot.approaches.iter().map(|a| a.count).collect::<Vec<_>>(),
        "green_seconds": snapshot.green_seconds,
    });

    let json_line = serde_json::to_string(&record)?;
    writeln!(file, "{}", json_line)?;
    file.flush()?;
    info!("💾 Submission record saved to JSONL");
    Ok(())
}
