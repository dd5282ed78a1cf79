use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::logging::LogOptions;
use crate::services::orchestrator::OrchestratorOptions;
use crate::services::settings::DEFAULT_TARGET_LANGUAGE;

const DEFAULT_STAGE_TIMEOUT_MS: u64 = 30_000;
const MIN_STAGE_TIMEOUT_MS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayKind {
    Simulated,
    Llm,
}

impl GatewayKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "simulated" | "mock" => Some(Self::Simulated),
            "llm" | "openai" => Some(Self::Llm),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
    pub gateway: GatewayKind,
    pub stage_timeout: Duration,
    pub workers: usize,
    pub target_language: String,
    pub simulated_latency_scale: f64,
    pub data_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Self {
        let port = env_parse::<u16>("PORT").unwrap_or(3000);

        let host = env_parse::<IpAddr>("HOST").unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));

        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let log_dir = env_flag("ENABLE_FILE_LOGS").then(|| {
            PathBuf::from(std::env::var("LOG_DIR").unwrap_or_else(|_| "./logs".to_string()))
        });

        let gateway = env_string("FLASHCARD_GATEWAY")
            .and_then(|v| GatewayKind::parse(&v))
            .unwrap_or(GatewayKind::Simulated);

        let stage_timeout = stage_timeout(env_parse::<u64>("FLASHCARD_STAGE_TIMEOUT_MS"));

        let workers = env_parse::<usize>("FLASHCARD_WORKERS").unwrap_or(1).max(1);

        let target_language = env_string("FLASHCARD_TARGET_LANGUAGE")
            .unwrap_or_else(|| DEFAULT_TARGET_LANGUAGE.to_string());

        let simulated_latency_scale = env_parse::<f64>("FLASHCARD_SIMULATED_LATENCY_SCALE")
            .filter(|v| v.is_finite() && *v >= 0.0)
            .unwrap_or(1.0);

        let data_dir = env_string("FLASHCARD_DATA_DIR")
            .map(PathBuf::from)
            .or_else(|| dirs::data_local_dir().map(|d| d.join("flashcard-forge")))
            .unwrap_or_else(|| PathBuf::from("./data"));

        Self {
            host,
            port,
            log_level,
            log_dir,
            gateway,
            stage_timeout,
            workers,
            target_language,
            simulated_latency_scale,
            data_dir,
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.data_dir.join("audio")
    }

    pub fn export_dir(&self) -> PathBuf {
        self.data_dir.join("exports")
    }

    pub fn log_options(&self) -> LogOptions {
        LogOptions {
            level: self.log_level.clone(),
            file_dir: self.log_dir.clone(),
        }
    }

    pub fn orchestrator_options(&self) -> OrchestratorOptions {
        OrchestratorOptions {
            stage_timeout: self.stage_timeout,
            workers: self.workers,
        }
    }
}

/// Unset falls back to the default; values below the floor are raised to it.
fn stage_timeout(raw_ms: Option<u64>) -> Duration {
    Duration::from_millis(
        raw_ms
            .unwrap_or(DEFAULT_STAGE_TIMEOUT_MS)
            .max(MIN_STAGE_TIMEOUT_MS),
    )
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key)?.trim().parse().ok()
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_kind_parse() {
        assert_eq!(GatewayKind::parse("LLM"), Some(GatewayKind::Llm));
        assert_eq!(GatewayKind::parse(" simulated "), Some(GatewayKind::Simulated));
        assert_eq!(GatewayKind::parse("mock"), Some(GatewayKind::Simulated));
        assert_eq!(GatewayKind::parse("grpc"), None);
    }

    #[test]
    fn test_stage_timeout_has_floor() {
        assert_eq!(stage_timeout(None), Duration::from_millis(DEFAULT_STAGE_TIMEOUT_MS));
        assert_eq!(stage_timeout(Some(0)), Duration::from_millis(MIN_STAGE_TIMEOUT_MS));
        assert_eq!(stage_timeout(Some(5_000)), Duration::from_millis(5_000));
    }

    #[test]
    fn test_derived_paths() {
        let mut config = Config::from_env();
        config.data_dir = PathBuf::from("/tmp/ff");
        assert_eq!(config.audio_dir(), PathBuf::from("/tmp/ff/audio"));
        assert_eq!(config.export_dir(), PathBuf::from("/tmp/ff/exports"));
        assert!(config.workers >= 1);
    }
}
