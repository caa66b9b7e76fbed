//! Campaign Launcher - Enrolls users into phishing simulation campaigns

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use trainhub_common::config::SimulationConfig;
use trainhub_common::types::{BundleId, SimulationId, UserId};
use trainhub_common::{Error, Result};

/// One user to enroll in a simulation campaign
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchTarget {
    pub simulation_id: SimulationId,
    pub simulation_name: String,
    pub campaign_type: String,
    pub bundle_id: BundleId,
    pub user_id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: Option<String>,
}

/// Launches a simulation for one target. Failures are per target.
#[async_trait]
pub trait CampaignLauncher: Send + Sync {
    async fn launch(&self, target: &LaunchTarget) -> Result<()>;
}

/// Campaign launcher posting enrollments to the simulation platform API
pub struct HttpCampaignLauncher {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpCampaignLauncher {
    pub fn new(config: &SimulationConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/enrollments", config.launcher_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl CampaignLauncher for HttpCampaignLauncher {
    async fn launch(&self, target: &LaunchTarget) -> Result<()> {
        let mut request = self.client.post(&self.endpoint).json(target);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Launch request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport(format!(
                "Simulation platform returned status {}",
                status
            )));
        }

        debug!(
            "Simulation {} launched for {}",
            target.simulation_id, target.email
        );
        Ok(())
    }
}
