use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::store::http::HttpStoreConfig;

#[derive(Parser, Debug, Clone)]
#[command(name = "admitd")]
#[command(
    version,
    about = "Admit card issuance sidecar - JSON lines on stdin/stdout"
)]
pub struct Args {
    /// Workspace directory opened at startup.
    #[arg(long, env = "ADMITD_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Base URL of the records API. When set, the remote store is connected at startup.
    #[arg(long, env = "ADMITD_API_BASE_URL")]
    pub api_base_url: Option<String>,

    /// Bearer token for the records API.
    #[arg(long, env = "ADMITD_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// Per-request timeout for the records API, in seconds.
    #[arg(long, env = "ADMITD_HTTP_TIMEOUT_SECS", default_value_t = 30)]
    pub http_timeout_secs: u64,

    /// Directories searched for fonts the PDF export needs (comma separated).
    /// Defaults to the platform font directories.
    #[arg(long = "font-dir", env = "ADMITD_FONT_DIRS", value_delimiter = ',')]
    pub font_dirs: Vec<PathBuf>,

    /// Output logs as JSON (stderr).
    #[arg(long, env = "ADMITD_LOG_JSON")]
    pub log_json: bool,
}

impl Args {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }

    /// Remote store settings, if a base URL was given.
    pub fn http_store(&self) -> Option<HttpStoreConfig> {
        let base_url = self.api_base_url.clone()?;
        Some(HttpStoreConfig {
            base_url,
            token: self.api_token.clone().unwrap_or_default(),
            timeout: self.http_timeout(),
        })
    }
}
