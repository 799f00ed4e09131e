use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// One labeled confidence score as produced by the upstream classifier.
///
/// Fields the relay does not know about (for example `boundingBox` on
/// detection results) are kept in `extra` and written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub tag_id: String,
    pub tag_name: String,
    pub probability: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Prediction {
    pub fn new(tag_id: impl Into<String>, tag_name: impl Into<String>, probability: f64) -> Self {
        Self {
            tag_id: tag_id.into(),
            tag_name: tag_name.into(),
            probability,
            extra: Map::new(),
        }
    }

    /// Probability rendered as a percentage with two decimals, e.g. `70.00%`.
    pub fn percentage(&self) -> String {
        format!("{:.2}%", self.probability * 100.0)
    }
}

/// Orders predictions from most to least confident.
///
/// The sort is stable, so predictions with equal probability keep the order
/// the upstream service returned them in.
pub fn sort_descending_by_probability(mut predictions: Vec<Prediction>) -> Vec<Prediction> {
    predictions.sort_by(|a, b| b.probability.total_cmp(&a.probability));
    predictions
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub predictions: Vec<Prediction>,
}

impl ClassificationResult {
    /// Pulls the `predictions` array out of an upstream success payload.
    ///
    /// A missing or non-array `predictions` yields an empty result; entries
    /// that do not look like a prediction are skipped.
    pub fn from_upstream(payload: &Value) -> Self {
        let Some(entries) = payload.get("predictions").and_then(Value::as_array) else {
            warn!("Upstream payload has no predictions array");
            return Self {
                predictions: Vec::new(),
            };
        };

        let predictions: Vec<Prediction> = entries
            .iter()
            .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
            .collect();

        let skipped = entries.len() - predictions.len();
        if skipped > 0 {
            warn!("Skipped {skipped} malformed upstream predictions");
        }

        Self {
            predictions: sort_descending_by_probability(predictions),
        }
    }

    pub fn top(&self) -> Option<&Prediction> {
        self.predictions.first()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskType {
    #[default]
    Classify,
    Detect,
}

impl TaskType {
    /// Case-insensitive; anything other than `detect` means classification.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "detect" => TaskType::Detect,
            "classify" | "" => TaskType::Classify,
            other => {
                warn!("Unknown task type {other:?}, falling back to classify");
                TaskType::Classify
            }
        }
    }

    pub fn as_path_segment(&self) -> &'static str {
        match self {
            TaskType::Classify => "classify",
            TaskType::Detect => "detect",
        }
    }
}

/// An image received from the client, held in memory for one request only.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Bytes,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
}

/// Wire shape of every relay failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}
