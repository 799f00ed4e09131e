use std::{env, fmt, str::FromStr, time::Duration};

use reqwest::Url;
use thiserror::Error;
use tracing::info;

use crate::models::TaskType;

pub const ENDPOINT: &str = "CLASSIFIER_ENDPOINT";
pub const PROJECT_ID: &str = "CLASSIFIER_PROJECT_ID";
pub const MODEL_NAME: &str = "CLASSIFIER_MODEL_NAME";
pub const PREDICTION_KEY: &str = "CLASSIFIER_PREDICTION_KEY";
pub const TASK: &str = "CLASSIFIER_TASK";
pub const API_PATH: &str = "CLASSIFIER_API_PATH";
pub const HOST: &str = "RELAY_HOST";
pub const PORT: &str = "PORT";
pub const UPSTREAM_TIMEOUT_SECS: &str = "RELAY_UPSTREAM_TIMEOUT_SECS";
pub const MAX_UPLOAD_BYTES: &str = "RELAY_MAX_UPLOAD_BYTES";
pub const ALLOWED_ORIGINS: &str = "RELAY_ALLOWED_ORIGINS";

const DEFAULT_API_PATH: &str = "customvision/v3.0/Prediction";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: &str = "5050";
const DEFAULT_TIMEOUT_SECS: &str = "20";
const DEFAULT_MAX_UPLOAD_BYTES: &str = "6291456";
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:5173";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Settings read once at startup and shared read-only with every request.
#[derive(Clone)]
pub struct RelayConfig {
    pub endpoint: String,
    pub project_id: String,
    pub model_name: String,
    pub prediction_key: String,
    pub task: TaskType,
    pub api_path: String,
    pub host: String,
    pub port: u16,
    pub upstream_timeout: Duration,
    pub max_upload_bytes: usize,
    pub allowed_origins: Vec<String>,
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key/value source.
    ///
    /// Every absent required key is reported at once so the operator can fix
    /// them in a single pass. Blank values count as absent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut missing = Vec::new();
        let mut required = |key: &'static str| {
            var(key).unwrap_or_else(|| {
                missing.push(key);
                String::new()
            })
        };

        let endpoint = required(ENDPOINT);
        let project_id = required(PROJECT_ID);
        let model_name = required(MODEL_NAME);
        let prediction_key = required(PREDICTION_KEY);

        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let endpoint = endpoint.trim_end_matches('/').to_string();
        Url::parse(&endpoint).map_err(|e| ConfigError::Invalid {
            key: ENDPOINT,
            reason: e.to_string(),
        })?;

        let optional = |key: &'static str, default: &str| {
            var(key).unwrap_or_else(|| {
                info!("{key} not set, using default: {default}");
                default.to_string()
            })
        };

        Ok(Self {
            endpoint,
            project_id,
            model_name,
            prediction_key,
            task: TaskType::parse(&optional(TASK, "classify")),
            api_path: optional(API_PATH, DEFAULT_API_PATH),
            host: optional(HOST, DEFAULT_HOST),
            port: parse(PORT, &optional(PORT, DEFAULT_PORT))?,
            upstream_timeout: Duration::from_secs(parse_positive(
                UPSTREAM_TIMEOUT_SECS,
                &optional(UPSTREAM_TIMEOUT_SECS, DEFAULT_TIMEOUT_SECS),
            )?),
            max_upload_bytes: parse_positive(
                MAX_UPLOAD_BYTES,
                &optional(MAX_UPLOAD_BYTES, DEFAULT_MAX_UPLOAD_BYTES),
            )?,
            allowed_origins: parse_origins(&optional(ALLOWED_ORIGINS, DEFAULT_ALLOWED_ORIGINS))?,
        })
    }

    /// `{endpoint}/{api path}/{project}/{task}/iterations/{model}/image`, with
    /// each segment percent-encoded.
    pub fn prediction_url(&self) -> Result<Url, ConfigError> {
        let invalid = |reason: &str| ConfigError::Invalid {
            key: ENDPOINT,
            reason: reason.to_string(),
        };

        let mut url = Url::parse(&self.endpoint).map_err(|e| invalid(&e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("endpoint cannot be used as a base URL"))?
            .pop_if_empty()
            .extend(self.api_path.split('/').filter(|s| !s.is_empty()))
            .push(&self.project_id)
            .push(self.task.as_path_segment())
            .push("iterations")
            .push(&self.model_name)
            .push("image");

        Ok(url)
    }
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("endpoint", &self.endpoint)
            .field("project_id", &self.project_id)
            .field("model_name", &self.model_name)
            .field("prediction_key", &"<redacted>")
            .field("task", &self.task)
            .field("api_path", &self.api_path)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("upstream_timeout", &self.upstream_timeout)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("allowed_origins", &self.allowed_origins)
            .finish()
    }
}

fn parse<T: FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: format!("{raw:?}: {e}"),
    })
}

fn parse_positive<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr + Default + PartialEq,
    T::Err: fmt::Display,
{
    let value: T = parse(key, raw)?;
    if value == T::default() {
        return Err(ConfigError::Invalid {
            key,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

/// Comma separated list of `scheme://host[:port]` origins, or `*` for any.
fn parse_origins(raw: &str) -> Result<Vec<String>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(|origin| {
            if origin == "*" {
                return Ok(origin.to_string());
            }

            let invalid = || ConfigError::Invalid {
                key: ALLOWED_ORIGINS,
                reason: format!("{origin:?} is not an origin like http://host:port"),
            };
            let url = Url::parse(origin).map_err(|_| invalid())?;
            let serialized = url.origin().ascii_serialization();
            if !url.origin().is_tuple() || serialized != origin.trim_end_matches('/') {
                return Err(invalid());
            }
            Ok(serialized)
        })
        .collect()
}
