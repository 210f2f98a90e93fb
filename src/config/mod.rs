use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Cloudflare account ID
    pub cf_account_id: String,

    /// Cloudflare Workers AI API token
    pub cf_api_token: String,

    /// Workers AI API base URL (overridable for tests)
    #[serde(default = "default_inference_base_url")]
    pub inference_base_url: String,

    /// Per-request timeout for inference calls, in seconds
    #[serde(default = "default_inference_timeout_secs")]
    pub inference_timeout_secs: u64,

    /// Europe PMC REST base URL for citation lookups
    #[serde(default = "default_reference_base_url")]
    pub reference_base_url: String,

    /// Spool directory for job record documents
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Job record retention window, in seconds
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,

    /// Period of the expired-record sweep, in seconds
    #[serde(default = "default_sweep_secs")]
    pub sweep_secs: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_inference_base_url() -> String {
    "https://api.cloudflare.com/client/v4".to_string()
}

fn default_inference_timeout_secs() -> u64 {
    60
}

fn default_reference_base_url() -> String {
    "https://www.ebi.ac.uk/europepmc/webservices/rest".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data/jobs")
}

fn default_retention_secs() -> u64 {
    3600
}

fn default_sweep_secs() -> u64 {
    300
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }
}
