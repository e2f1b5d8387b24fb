use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use figment::{Figment, providers::{Env, Format, Toml, Serialized}};
use garde::Validate;

use super::AppConfig;

/// Prefix of environment variables read into the configuration
pub const ENV_PREFIX: &str = "CLINIC_";

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "clinic-access", about = "Inspect what the current session is allowed to do")]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, env = "CLINIC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Environment name
    #[arg(long, env = "ENVIRONMENT")]
    pub environment: Option<String>,

    /// Backend base URL
    #[arg(long)]
    pub base_url: Option<String>,

    /// Session token
    #[arg(long, env = "CLINIC_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Permission codes to check, e.g. patient.create
    #[arg(long = "check", value_name = "CODE")]
    pub checks: Vec<String>,

    /// List accessible resources and their actions
    #[arg(long)]
    pub resources: bool,

    /// Print the full permission catalog grouped by resource
    #[arg(long)]
    pub catalog: bool,
}

/// Load configuration with the layered hierarchy
///
/// 1. Embedded defaults
/// 2. `config/default.toml` (or the file given with `--config`)
/// 3. `config/{environment}.toml`
/// 4. `CLINIC_` environment variables, `__` separating sections
/// 5. Command line overrides
pub fn load_config(cli: &Cli) -> Result<AppConfig> {
    let env_name = cli.environment.clone().unwrap_or_else(||
        std::env::var("ENVIRONMENT").unwrap_or_else(|_| "production".to_string())
    );

    let base_file = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("config/default.toml"));

    let figment = Figment::new()
        .merge(Serialized::defaults(AppConfig::default()))
        .merge(Toml::file(base_file))
        .merge(Toml::file(format!("config/{}.toml", env_name)))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let mut config: AppConfig = figment.extract()?;
    apply_cli_overrides(&mut config, cli);

    config.validate()?;

    Ok(config)
}

fn apply_cli_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(base_url) = &cli.base_url {
        config.api.base_url = base_url.clone();
    }
    if let Some(token) = &cli.token {
        config.api.token = Some(token.clone());
    }
    if cli.debug {
        config.logging.level = "debug".to_string();
        config.logging.format = "pretty".to_string();
    }
}
