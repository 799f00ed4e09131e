//! Relay between a browser client and a cloud image-classification API.
//!
//! The client posts an image to `POST /api/classify`; the relay forwards the
//! raw bytes to the configured prediction endpoint and hands back its
//! predictions, most confident first. Nothing is stored between requests.

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod server;
pub mod state;
pub mod upload;
pub mod upstream;

pub use config::RelayConfig;
pub use error::RelayError;
pub use models::{sort_descending_by_probability, ClassificationResult, Prediction};
pub use state::AppState;
