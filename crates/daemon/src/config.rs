//! Daemon configuration, resolved once from the environment at startup

use anyhow::{bail, Context, Result};
use quizgen_api_rpc::RpcServerConfig;
use quizgen_infra_system::SubprocessGeneratorConfig;
use std::path::PathBuf;
use std::time::Duration;

use crate::logging::LogFormat;

const DEFAULT_DB_PATH: &str = "~/.quizgen/jobs.db";
const DEFAULT_SOURCES_DIR: &str = "~/.quizgen/sources";
const DEFAULT_GENERATOR_CMD: &str = "quizgen-generator";

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub db_path: PathBuf,
    pub rpc: RpcServerConfig,
    pub sources_dir: PathBuf,
    pub generator: SubprocessGeneratorConfig,
    pub log_format: LogFormat,
    pub log_dir: Option<PathBuf>,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup (the process environment in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let db_path = expand(&get("QUIZGEN_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.into()));
        let sources_dir =
            expand(&get("QUIZGEN_SOURCES_DIR").unwrap_or_else(|| DEFAULT_SOURCES_DIR.into()));

        let mut rpc = RpcServerConfig::default();
        if let Some(host) = get("QUIZGEN_RPC_HOST") {
            rpc.host = host;
        }
        if let Some(port) = get("QUIZGEN_RPC_PORT") {
            rpc.port = port
                .parse()
                .with_context(|| format!("QUIZGEN_RPC_PORT is not a port number: {}", port))?;
        }

        let mut generator = SubprocessGeneratorConfig::new(
            get("QUIZGEN_GENERATOR_CMD").unwrap_or_else(|| DEFAULT_GENERATOR_CMD.into()),
        );
        if let Some(args) = get("QUIZGEN_GENERATOR_ARGS") {
            generator.args = args.split_whitespace().map(str::to_string).collect();
        }
        if let Some(extra) = get("QUIZGEN_GENERATOR_ENV") {
            generator.env_allowlist.extend(
                extra
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string),
            );
        }
        if let Some(secs) = get("QUIZGEN_GENERATOR_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .with_context(|| format!("QUIZGEN_GENERATOR_TIMEOUT_SECS is not a number: {}", secs))?;
            if secs == 0 {
                bail!("QUIZGEN_GENERATOR_TIMEOUT_SECS must be positive");
            }
            generator.timeout = Some(Duration::from_secs(secs));
        }

        let log_format = match get("QUIZGEN_LOG_FORMAT") {
            Some(value) => LogFormat::parse(&value)
                .with_context(|| format!("QUIZGEN_LOG_FORMAT must be json or pretty: {}", value))?,
            None => LogFormat::Pretty,
        };
        let log_dir = get("QUIZGEN_LOG_DIR").map(|dir| expand(&dir));

        Ok(Self {
            db_path,
            rpc,
            sources_dir,
            generator,
            log_format,
            log_dir,
        })
    }

    pub fn database_url(&self) -> String {
        format!("sqlite://{}", self.db_path.display())
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}
