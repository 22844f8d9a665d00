// src/submission.rs
//
// Submission lifecycle for one intersection. A submission takes the four
// selected approach photos through upload, normalization, and local timing
// derivation, then commits the result as a whole snapshot. The previous
// snapshot stays visible until the moment a new one replaces it; failures
// never touch it.

use chrono::Utc;
use tracing::{error, info, warn};

use crate::analysis_client::{AnalysisClient, NormalizedAnalysis};
use crate::error::SubmissionError;
use crate::image_set::ApproachImage;
use crate::timing;
use crate::types::{IntersectionSnapshot, TimingConfig, APPROACH_COUNT};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SubmissionState {
    Idle,
    Submitting,
    Succeeded,
    Failed,
}

impl SubmissionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionState::Idle => "idle",
            SubmissionState::Submitting => "submitting",
            SubmissionState::Succeeded => "succeeded",
            SubmissionState::Failed => "failed",
        }
    }
}

/// What happened to a submit call.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// New snapshot committed and visible.
    Committed,
    /// A submission was already in flight; this call did nothing.
    Ignored,
    /// Submission failed; any prior snapshot is untouched.
    Rejected(SubmissionError),
}

/// Pre-flight check result. Only `Ready` moves the machine to Submitting.
#[derive(Debug, PartialEq)]
enum SubmitGate {
    Ready,
    AlreadyInFlight,
    WrongImageCount(usize),
}

#[derive(Debug, Default, Clone)]
pub struct SubmissionStats {
    pub attempts: u32,
    pub committed: u32,
    pub failed: u32,
    pub ignored_in_flight: u32,
}

pub struct SubmissionOrchestrator {
    timing: TimingConfig,
    state: SubmissionState,
    images: Vec<ApproachImage>,
    snapshot: Option<IntersectionSnapshot>,
    last_error: Option<SubmissionError>,
    stats: SubmissionStats,
}

impl SubmissionOrchestrator {
    pub fn new(timing: TimingConfig) -> Self {
        Self {
            timing,
            state: SubmissionState::Idle,
            images: Vec::new(),
            snapshot: None,
            last_error: None,
            stats: SubmissionStats::default(),
        }
    }

    /// Replace the current image selection. Any count is accepted here;
    /// the exactly-four rule is enforced at submit time. Returns false if
    /// a submission is in flight, in which case the selection is unchanged.
    pub fn select_images(&mut self, images: Vec<ApproachImage>) -> bool {
        if self.state == SubmissionState::Submitting {
            warn!("⚠️ Cannot change image selection while a submission is in flight");
            return false;
        }

        info!("Selected {} approach images", images.len());
        self.images = images;
        true
    }

    /// Run one full submission: upload, normalize, derive timings, commit.
    ///
    /// Calling while a submission is in flight is a no-op. A wrong image
    /// count is rejected before any network traffic and leaves the state
    /// machine where it was.
    pub async fn submit(&mut self, client: &AnalysisClient) -> SubmitOutcome {
        match self.begin_submission() {
            SubmitGate::AlreadyInFlight => {
                warn!("⚠️ Submission already in flight, ignoring");
                self.stats.ignored_in_flight += 1;
                SubmitOutcome::Ignored
            }
            SubmitGate::WrongImageCount(actual) => {
                self.stats.attempts += 1;
                let err = SubmissionError::InvalidInputCount { actual };
                self.reject(err.clone());
                SubmitOutcome::Rejected(err)
            }
            SubmitGate::Ready => {
                self.stats.attempts += 1;
                info!("→ Submission started");

                match client.analyze(&self.images).await {
                    Ok(analysis) => {
                        self.commit(analysis);
                        SubmitOutcome::Committed
                    }
                    Err(err) => {
                        self.fail(err.clone());
                        SubmitOutcome::Rejected(err)
                    }
                }
            }
        }
    }

    /// Explicit reset back to Idle: drops the image selection, the committed
    /// snapshot, and any error. Ignored while a submission is in flight.
    pub fn reset_to_idle(&mut self) {
        if self.state == SubmissionState::Submitting {
            return;
        }
        self.state = SubmissionState::Idle;
        self.images.clear();
        self.snapshot = None;
        self.last_error = None;
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    pub fn snapshot(&self) -> Option<&IntersectionSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn last_error(&self) -> Option<&SubmissionError> {
        self.last_error.as_ref()
    }

    pub fn images(&self) -> &[ApproachImage] {
        &self.images
    }

    pub fn log_summary(&self) {
        let stats = &self.stats;
        info!(
            "📊 Submissions: {} attempted, {} committed, {} failed, {} ignored in flight",
            stats.attempts, stats.committed, stats.failed, stats.ignored_in_flight
        );
        info!("📊 State: {}", self.state.as_str());
        if let Some(snapshot) = &self.snapshot {
            info!(
                "📊 Current snapshot {}: {} vehicles total, green seconds {:?}",
                snapshot.submission_id,
                snapshot.total_vehicles(),
                snapshot.green_seconds
            );
        }
        if let Some(err) = self.last_error() {
            info!("📊 Last error: {} ({})", err, err.kind());
        }
    }

    fn begin_submission(&mut self) -> SubmitGate {
        if self.state == SubmissionState::Submitting {
            return SubmitGate::AlreadyInFlight;
        }
        if self.images.len() != APPROACH_COUNT {
            return SubmitGate::WrongImageCount(self.images.len());
        }

        self.state = SubmissionState::Submitting;
        SubmitGate::Ready
    }

    fn commit(&mut self, analysis: NormalizedAnalysis) {
        let green_seconds = timing::derive_all_green_seconds(&analysis.approaches, &self.timing);
        compare_server_timings(&analysis.server_green_seconds, &green_seconds);

        let snapshot = IntersectionSnapshot {
            submission_id: uuid::Uuid::new_v4().to_string(),
            committed_at: Utc::now(),
            approaches: analysis.approaches,
            green_seconds,
        };

        info!(
            "✅ Committed snapshot {}: {} vehicles, green seconds {:?}",
            snapshot.submission_id,
            snapshot.total_vehicles(),
            snapshot.green_seconds
        );

        self.snapshot = Some(snapshot);
        self.state = SubmissionState::Succeeded;
        self.last_error = None;
        self.stats.committed += 1;
    }

    /// Record a submit that failed its precondition. Nothing was in flight,
    /// so the state machine stays exactly where it was.
    fn reject(&mut self, err: SubmissionError) {
        error!("❌ Submission rejected ({}): {}", err.kind(), err);
        self.last_error = Some(err);
        self.stats.failed += 1;
    }

    fn fail(&mut self, err: SubmissionError) {
        error!("❌ Submission failed ({}): {}", err.kind(), err);
        self.state = SubmissionState::Failed;
        self.last_error = Some(err);
        self.stats.failed += 1;
    }
}

/// The server also suggests timings; committed timings are always derived
/// locally, so disagreement is only worth a warning.
fn compare_server_timings(server: &[f64; APPROACH_COUNT], local: &[u32; APPROACH_COUNT]) {
    for (idx, (suggested, derived)) in server.iter().zip(local.iter()).enumerate() {
        if (suggested - *derived as f64).abs() > 0.5 {
            warn!(
                "⚠️ Approach {}: server suggested {:.0}s green, keeping locally derived {}s",
                idx, suggested, derived
            );
        }
    }
}
