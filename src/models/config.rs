//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and crawling behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Open-data API settings
    #[serde(default)]
    pub annuaire: AnnuaireConfig,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Export settings
    #[serde(default)]
    pub export: ExportConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.detail_concurrency == 0 {
            return Err(AppError::validation(
                "crawler.detail_concurrency must be > 0",
            ));
        }
        if url::Url::parse(&self.crawler.base_url).is_err() {
            return Err(AppError::validation("crawler.base_url is not a valid URL"));
        }
        if self.annuaire.page_size == 0 {
            return Err(AppError::validation("annuaire.page_size must be > 0"));
        }
        if self.export.data_dir.trim().is_empty() {
            return Err(AppError::validation("export.data_dir is empty"));
        }
        Ok(())
    }
}

/// HTTP client and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Root URL of the directory site
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Delay between listing page requests in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Worker count for the detail-fetch pool
    #[serde(default = "defaults::detail_concurrency")]
    pub detail_concurrency: usize,

    /// Upper bound accepted for a requested page count (0 stays "all")
    #[serde(default = "defaults::max_pages")]
    pub max_pages: usize,

    /// How many listing pages the category tag scan visits
    #[serde(default = "defaults::category_scan_pages")]
    pub category_scan_pages: usize,

    /// Delay between category scan requests in milliseconds
    #[serde(default = "defaults::category_scan_delay")]
    pub category_scan_delay_ms: u64,

    /// Collection slug whose page carries the sidebar listing
    #[serde(default = "defaults::sidebar_probe_slug")]
    pub sidebar_probe_slug: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: defaults::request_delay(),
            detail_concurrency: defaults::detail_concurrency(),
            max_pages: defaults::max_pages(),
            category_scan_pages: defaults::category_scan_pages(),
            category_scan_delay_ms: defaults::category_scan_delay(),
            sidebar_probe_slug: defaults::sidebar_probe_slug(),
        }
    }
}

impl CrawlerConfig {
    /// Root URL of the paginated collection listing.
    pub fn collection_url(&self) -> String {
        format!("{}/startup-collection", self.base_url.trim_end_matches('/'))
    }
}

/// Open-data API settings for the school directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnuaireConfig {
    /// Records endpoint of the dataset
    #[serde(default = "defaults::annuaire_api_base")]
    pub api_base: String,

    /// Rows requested per API page
    #[serde(default = "defaults::annuaire_page_size")]
    pub page_size: usize,

    /// Delay between API requests in milliseconds
    #[serde(default = "defaults::annuaire_request_delay")]
    pub request_delay_ms: u64,

    /// Per-request timeout in seconds
    #[serde(default = "defaults::annuaire_timeout")]
    pub timeout_secs: u64,
}

impl Default for AnnuaireConfig {
    fn default() -> Self {
        Self {
            api_base: defaults::annuaire_api_base(),
            page_size: defaults::annuaire_page_size(),
            request_delay_ms: defaults::annuaire_request_delay(),
            timeout_secs: defaults::annuaire_timeout(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "defaults::host")]
    pub host: String,

    /// Bind port
    #[serde(default = "defaults::port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: defaults::host(),
            port: defaults::port(),
        }
    }
}

/// Export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory export files are written to
    #[serde(default = "defaults::data_dir")]
    pub data_dir: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::data_dir(),
        }
    }
}

mod defaults {
    // Crawler defaults
    pub fn base_url() -> String {
        "https://lespepitestech.com".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
         AppleWebKit/537.36 (KHTML, like Gecko) \
         Chrome/120.0.0.0 Safari/537.36"
            .into()
    }
    pub fn timeout() -> u64 {
        15
    }
    pub fn request_delay() -> u64 {
        1000
    }
    pub fn detail_concurrency() -> usize {
        4
    }
    pub fn max_pages() -> usize {
        100
    }
    pub fn category_scan_pages() -> usize {
        5
    }
    pub fn category_scan_delay() -> u64 {
        300
    }
    pub fn sidebar_probe_slug() -> String {
        "saas".into()
    }

    // Open-data API defaults
    pub fn annuaire_api_base() -> String {
        "https://data.education.gouv.fr/api/explore/v2.1\
         /catalog/datasets/fr-en-annuaire-education/records"
            .into()
    }
    pub fn annuaire_page_size() -> usize {
        100
    }
    pub fn annuaire_request_delay() -> u64 {
        300
    }
    pub fn annuaire_timeout() -> u64 {
        20
    }

    // Server defaults
    pub fn host() -> String {
        "0.0.0.0".into()
    }
    pub fn port() -> u16 {
        8080
    }

    // Export defaults
    pub fn data_dir() -> String {
        "data".into()
    }
}
