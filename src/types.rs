use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An intersection snapshot always covers exactly four approaches.
pub const APPROACH_COUNT: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub images: ImagesConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub render: RenderConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesConfig {
    pub input_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    pub base_seconds: u32,
    pub per_vehicle_seconds: u32,
    pub min_seconds: u32,
    pub max_seconds: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            base_seconds: 15,
            per_vehicle_seconds: 5,
            min_seconds: 15,
            max_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub box_thickness: u32,
    pub label_text_scale: u32,
    pub save_annotated: bool,
    pub output_dir: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            box_thickness: 2,
            label_text_scale: 2,
            save_annotated: true,
            output_dir: "output".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub login_email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// Axis-aligned box in source-image pixel space, corners (x1, y1) and (x2, y2).
///
/// Well-formed boxes satisfy x1 < x2 and y1 < y2 with non-negative corners,
/// but the detection service is untrusted: degenerate boxes are representable
/// and must survive all the way to the renderer without being coerced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn from_corners(corners: [f32; 4]) -> Self {
        Self {
            x1: corners[0],
            y1: corners[1],
            x2: corners[2],
            y2: corners[3],
        }
    }

    pub fn is_well_formed(&self) -> bool {
        self.x1 >= 0.0 && self.y1 >= 0.0 && self.x1 < self.x2 && self.y1 < self.y2
    }

    /// Width for drawing, clamped to zero for inverted boxes.
    pub fn draw_width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    /// Height for drawing, clamped to zero for inverted boxes.
    pub fn draw_height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }
}

/// One vehicle reported by the detection service. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleDetection {
    pub bbox: BoundingBox,
    pub label: String,
    pub confidence: f32,
}

/// Detections for a single intersection approach.
///
/// `count` is authoritative for timing derivation, `vehicles` for rendering.
/// The two may disagree (the upstream service has shipped mismatches); callers
/// treat that as a warning, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApproachResult {
    pub count: usize,
    pub vehicles: Vec<VehicleDetection>,
}

impl ApproachResult {
    pub fn has_count_mismatch(&self) -> bool {
        self.count != self.vehicles.len()
    }
}

/// The committed outcome of one accepted submission: four approach results
/// paired with their locally derived green-light seconds.
///
/// Built whole or not at all, and replaced whole by the next success. Never
/// mutated in place.
#[derive(Debug, Clone, Serialize)]
pub struct IntersectionSnapshot {
    pub submission_id: String,
    pub committed_at: DateTime<Utc>,
    pub approaches: [ApproachResult; APPROACH_COUNT],
    pub green_seconds: [u32; APPROACH_COUNT],
}

impl IntersectionSnapshot {
    pub fn total_vehicles(&self) -> usize {
        self.approaches.iter().map(|a| a.count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degenerate_box_clamps_to_zero() {
        let inverted = BoundingBox::from_corners([10.0, 10.0, 5.0, 5.0]);
        assert!(!inverted.is_well_formed());
        assert_eq!(inverted.draw_width(), 0.0);
        assert_eq!(inverted.draw_height(), 0.0);
    }

    #[test]
    fn test_well_formed_box() {
        let bbox = BoundingBox::from_corners([12.0, 8.0, 40.0, 30.0]);
        assert!(bbox.is_well_formed());
        assert_eq!(bbox.draw_width(), 28.0);
        assert_eq!(bbox.draw_height(), 22.0);
    }

    #[test]
    fn test_count_mismatch_detection() {
        let result = ApproachResult {
            count: 3,
            vehicles: Vec::new(),
        };
        assert!(result.has_count_mismatch());
    }
}
