// src/analysis_client.rs
//
// HTTP client for the remote vehicle-detection service. Uploads the four
// approach photos as a single multipart request and normalizes the response
// into exactly one result per approach. Anything that prevents that
// normalization becomes a typed SubmissionError; nothing here retries.

use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{Result, SubmissionError};
use crate::image_set::ApproachImage;
use crate::types::{ApproachResult, BoundingBox, ServerConfig, VehicleDetection, APPROACH_COUNT};

// ============================================================================
// WIRE TYPES
// ============================================================================

/// Raw response body. Every field is optional at this layer: the server is
/// untrusted, and missing pieces must surface as shape errors with a useful
/// message rather than a bare deserialization failure.
#[derive(Debug, Deserialize)]
struct AnalysisResponse {
    green_light_times: Option<Vec<f64>>,
    vehicle_data: Option<Vec<RawApproachData>>,
}

#[derive(Debug, Deserialize)]
struct RawApproachData {
    #[serde(default)]
    count: usize,
    #[serde(default)]
    vehicles: Vec<RawVehicle>,
}

#[derive(Debug, Deserialize)]
struct RawVehicle {
    bbox: Vec<f32>,
    #[serde(default)]
    label: String,
    #[serde(default)]
    confidence: f32,
}

/// Shape-checked analysis: one entry per approach, in upload order.
///
/// Server timings are carried for comparison only; committed timings are
/// always derived locally from the counts.
#[derive(Debug, Clone)]
pub struct NormalizedAnalysis {
    pub approaches: [ApproachResult; APPROACH_COUNT],
    pub server_green_seconds: [f64; APPROACH_COUNT],
}

// ============================================================================
// RESPONSE NORMALIZATION
// ============================================================================

fn normalize_response(raw: AnalysisResponse) -> Result<NormalizedAnalysis> {
    let times = raw
        .green_light_times
        .ok_or_else(|| SubmissionError::shape("missing green_light_times"))?;
    let data = raw
        .vehicle_data
        .ok_or_else(|| SubmissionError::shape("missing vehicle_data"))?;

    if times.len() != APPROACH_COUNT {
        return Err(SubmissionError::shape(format!(
            "expected {} green_light_times entries, got {}",
            APPROACH_COUNT,
            times.len()
        )));
    }
    if data.len() != APPROACH_COUNT {
        return Err(SubmissionError::shape(format!(
            "expected {} vehicle_data entries, got {}",
            APPROACH_COUNT,
            data.len()
        )));
    }

    let mut approaches = Vec::with_capacity(APPROACH_COUNT);
    for (approach_idx, raw_approach) in data.into_iter().enumerate() {
        approaches.push(convert_approach(raw_approach, approach_idx)?);
    }

    let approaches: [ApproachResult; APPROACH_COUNT] = approaches
        .try_into()
        .map_err(|_| SubmissionError::shape("approach conversion lost entries"))?;
    let server_green_seconds: [f64; APPROACH_COUNT] = times
        .try_into()
        .map_err(|_| SubmissionError::shape("timing conversion lost entries"))?;

    for (idx, approach) in approaches.iter().enumerate() {
        if approach.has_count_mismatch() {
            warn!(
                "⚠️ Approach {}: server count {} but {} vehicle boxes, keeping the count",
                idx,
                approach.count,
                approach.vehicles.len()
            );
        }
    }

    Ok(NormalizedAnalysis {
        approaches,
        server_green_seconds,
    })
}

fn convert_approach(raw: RawApproachData, approach_idx: usize) -> Result<ApproachResult> {
    let mut vehicles = Vec::with_capacity(raw.vehicles.len());
    for (vehicle_idx, vehicle) in raw.vehicles.into_iter().enumerate() {
        let corners: [f32; 4] = vehicle.bbox.as_slice().try_into().map_err(|_| {
            SubmissionError::shape(format!(
                "approach {} vehicle {}: bbox has {} coordinates, expected 4",
                approach_idx,
                vehicle_idx,
                vehicle.bbox.len()
            ))
        })?;

        // Degenerate but well-arity boxes pass through untouched; the
        // renderer clamps them to zero area instead of us rejecting here.
        let bbox = BoundingBox::from_corners(corners);
        if !bbox.is_well_formed() {
            warn!(
                "⚠️ Approach {} vehicle {}: degenerate bbox {:?}",
                approach_idx, vehicle_idx, bbox
            );
        }

        vehicles.push(VehicleDetection {
            bbox,
            label: vehicle.label,
            confidence: vehicle.confidence,
        });
    }

    Ok(ApproachResult {
        count: raw.count,
        vehicles,
    })
}

// ============================================================================
// ANALYSIS CLIENT
// ============================================================================

pub struct AnalysisClient {
    http_client: reqwest::Client,
    server_url: String,
    api_key: String,
    timeout_secs: u64,
}

impl AnalysisClient {
    pub fn new(config: &ServerConfig) -> anyhow::Result<Self> {
        use anyhow::Context;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http_client,
            server_url: config.url.clone(),
            api_key: config.api_key.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    /// Upload approach photos and return the normalized per-approach results.
    ///
    /// The caller is responsible for the exactly-four precondition; this
    /// method sends whatever it is given.
    pub async fn analyze(&self, images: &[ApproachImage]) -> Result<NormalizedAnalysis> {
        let form = build_multipart_form(images)?;

        info!(
            "📡 Uploading {} approach images to {}",
            images.len(),
            self.server_url
        );

        let mut request = self.http_client.post(&self.server_url).multipart(form);
        if !self.api_key.is_empty() {
            request = request.header("X-API-KEY", &self.api_key);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return Err(SubmissionError::Timeout {
                    secs: self.timeout_secs,
                })
            }
            Err(e) => return Err(SubmissionError::NetworkUnreachable(e.to_string())),
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) if e.is_timeout() => {
                return Err(SubmissionError::Timeout {
                    secs: self.timeout_secs,
                })
            }
            Err(e) => return Err(SubmissionError::Unknown(e.to_string())),
        };

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(SubmissionError::AuthenticationFailed);
        }
        if !status.is_success() {
            return Err(SubmissionError::UpstreamServerError {
                status: status.as_u16(),
                body,
            });
        }

        normalize_response(parse_response_body(&body)?)
    }
}

/// Decode the body into the wire shape. The same error covers broken JSON
/// and well-formed JSON with wrongly typed fields.
fn parse_response_body(body: &str) -> Result<AnalysisResponse> {
    serde_json::from_str(body)
        .map_err(|e| SubmissionError::shape(format!("could not parse response body: {}", e)))
}

fn build_multipart_form(images: &[ApproachImage]) -> Result<reqwest::multipart::Form> {
    let mut form = reqwest::multipart::Form::new();
    for image in images {
        let bytes = image
            .to_jpeg_bytes()
            .map_err(|e| SubmissionError::Unknown(e.to_string()))?;
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(format!("{}.jpg", image.name))
            .mime_str("image/jpeg")
            .map_err(|e| SubmissionError::Unknown(e.to_string()))?;

        // Every photo goes under the same field name; the server reads the
        // "images" field as a list.
        form = form.part("images", part);
    }

    Ok(form)
}
