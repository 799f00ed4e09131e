use crate::{config::RelayConfig, upstream::UpstreamClient};

/// Shared by every worker through `web::Data`; never mutated after startup.
pub struct AppState {
    pub config: RelayConfig,
    pub upstream: UpstreamClient,
}

impl AppState {
    pub fn new(config: RelayConfig) -> anyhow::Result<Self> {
        let upstream = UpstreamClient::new(&config)?;

        Ok(Self { config, upstream })
    }
}
