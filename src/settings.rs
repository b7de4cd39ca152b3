use std::path::PathBuf;

use anyhow::{Context, Result};
use config::{Config, Environment};
use serde::Deserialize;

const ENV_PREFIX: &str = "CATALOG";
const DEFAULT_API_BASE: &str = "https://api.github.com";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub github_token: Option<String>,
    pub api_base: String,
    pub projects_list: PathBuf,
    pub output_path: PathBuf,
    pub db_path: PathBuf,
    pub max_retries: u32,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Settings {
    /// Defaults, then `GITHUB_TOKEN`, then `CATALOG_*` variables.
    pub fn load() -> Result<Self> {
        Self::from_sources(
            Environment::with_prefix(ENV_PREFIX).try_parsing(true),
            std::env::var("GITHUB_TOKEN").ok(),
        )
    }

    fn from_sources(env: Environment, github_token: Option<String>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("api_base", DEFAULT_API_BASE)?
            .set_default("projects_list", "projects-list.txt")?
            .set_default("output_path", "projects.json")?
            .set_default("db_path", "data/catalog.sqlite")?
            .set_default("max_retries", 3_i64)?
            .set_default("request_timeout_secs", 30_i64)?
            .set_default(
                "user_agent",
                concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")),
            )?;
        if let Some(token) = github_token.filter(|t| !t.is_empty()) {
            builder = builder.set_default("github_token", token)?;
        }

        let config = builder.add_source(env).build()?;
        config.try_deserialize().context("Invalid configuration")
    }
}
