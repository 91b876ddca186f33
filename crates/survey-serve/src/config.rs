//! Application configuration loaded from environment variables.

use std::path::PathBuf;

use anyhow::Context;
use survey_ingest::{DedupeMode, LogConfig, PipelineConfig};

/// Default request body cap (64 KiB).
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 64 * 1024;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "0.0.0.0:5000").
    pub bind_addr: String,

    /// Path to the NDJSON survey log.
    pub data_path: PathBuf,

    /// Duplicate detection strategy.
    pub dedupe_mode: DedupeMode,

    /// Sync the log to disk after every append.
    pub fsync: bool,

    /// Port for the Prometheus `/metrics` listener. Disabled when `None`.
    pub metrics_port: Option<u16>,

    /// Maximum accepted request body size.
    pub body_limit_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - None (all have defaults for local development)
    ///
    /// Optional:
    /// - `SURVEY_BIND_ADDR`: Server bind address (default: "0.0.0.0:5000")
    /// - `SURVEY_DATA_PATH`: Survey log path (default: "data/survey.ndjson")
    /// - `SURVEY_DEDUPE_MODE`: `index` or `scan` (default: "index")
    /// - `SURVEY_FSYNC`: `true` or `false` (default: "true")
    /// - `SURVEY_METRICS_PORT`: Prometheus exporter port (default: disabled)
    /// - `SURVEY_BODY_LIMIT_BYTES`: Request body cap (default: 65536)
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr =
            std::env::var("SURVEY_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:5000".to_string());

        let data_path = std::env::var("SURVEY_DATA_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data/survey.ndjson"));

        let dedupe_mode = match std::env::var("SURVEY_DEDUPE_MODE") {
            Ok(s) => s.parse().context("invalid SURVEY_DEDUPE_MODE")?,
            Err(_) => DedupeMode::default(),
        };

        let fsync = match std::env::var("SURVEY_FSYNC") {
            Ok(s) => parse_bool(&s)
                .with_context(|| format!("invalid SURVEY_FSYNC '{s}' (expected true or false)"))?,
            Err(_) => true,
        };

        let metrics_port = std::env::var("SURVEY_METRICS_PORT")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.trim().parse::<u16>())
            .transpose()
            .context("invalid SURVEY_METRICS_PORT")?;

        let body_limit_bytes = match std::env::var("SURVEY_BODY_LIMIT_BYTES") {
            Ok(s) => s
                .trim()
                .parse::<usize>()
                .context("invalid SURVEY_BODY_LIMIT_BYTES")?,
            Err(_) => DEFAULT_BODY_LIMIT_BYTES,
        };

        tracing::info!(
            bind_addr = %bind_addr,
            data_path = %data_path.display(),
            dedupe_mode = %dedupe_mode,
            fsync,
            metrics_port = ?metrics_port,
            body_limit_bytes,
            "survey configuration loaded"
        );

        Ok(Self {
            bind_addr,
            data_path,
            dedupe_mode,
            fsync,
            metrics_port,
            body_limit_bytes,
        })
    }

    /// Settings for the intake pipeline.
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            log: LogConfig {
                path: self.data_path.clone(),
                fsync: self.fsync,
            },
            dedupe: self.dedupe_mode,
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize config tests that manipulate env vars.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const ENV_KEYS: &[&str] = &[
        "SURVEY_BIND_ADDR",
        "SURVEY_DATA_PATH",
        "SURVEY_DEDUPE_MODE",
        "SURVEY_FSYNC",
        "SURVEY_METRICS_PORT",
        "SURVEY_BODY_LIMIT_BYTES",
    ];

    /// Run `f` with exactly `vars` set among [`ENV_KEYS`], then restore.
    fn with_env_vars<F: FnOnce()>(vars: &[(&str, &str)], f: F) {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());

        let saved: Vec<_> = ENV_KEYS
            .iter()
            .map(|k| (*k, std::env::var(k).ok()))
            .collect();

        // SAFETY: env access is serialized by ENV_MUTEX.
        unsafe {
            for k in ENV_KEYS {
                std::env::remove_var(k);
            }
            for (k, v) in vars {
                std::env::set_var(k, v);
            }
        }

        f();

        // SAFETY: as above.
        unsafe {
            for (k, v) in &saved {
                match v {
                    Some(val) => std::env::set_var(k, val),
                    None => std::env::remove_var(k),
                }
            }
        }
    }

    #[test]
    fn config_defaults() {
        with_env_vars(&[], || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.bind_addr, "0.0.0.0:5000");
            assert_eq!(config.data_path, PathBuf::from("data/survey.ndjson"));
            assert_eq!(config.dedupe_mode, DedupeMode::Index);
            assert!(config.fsync);
            assert_eq!(config.metrics_port, None);
            assert_eq!(config.body_limit_bytes, DEFAULT_BODY_LIMIT_BYTES);
        });
    }

    #[test]
    fn config_custom_values() {
        with_env_vars(
            &[
                ("SURVEY_BIND_ADDR", "127.0.0.1:9090"),
                ("SURVEY_DATA_PATH", "/var/lib/survey/log.ndjson"),
                ("SURVEY_DEDUPE_MODE", "scan"),
                ("SURVEY_FSYNC", "false"),
                ("SURVEY_METRICS_PORT", "9091"),
                ("SURVEY_BODY_LIMIT_BYTES", "4096"),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.bind_addr, "127.0.0.1:9090");
                assert_eq!(
                    config.data_path,
                    PathBuf::from("/var/lib/survey/log.ndjson")
                );
                assert_eq!(config.dedupe_mode, DedupeMode::Scan);
                assert!(!config.fsync);
                assert_eq!(config.metrics_port, Some(9091));
                assert_eq!(config.body_limit_bytes, 4096);

                let pipeline = config.pipeline();
                assert_eq!(pipeline.log.path, config.data_path);
                assert!(!pipeline.log.fsync);
                assert_eq!(pipeline.dedupe, DedupeMode::Scan);
            },
        );
    }

    #[test]
    fn config_blank_metrics_port_disables_exporter() {
        with_env_vars(&[("SURVEY_METRICS_PORT", "  ")], || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.metrics_port, None);
        });
    }

    #[test]
    fn config_rejects_unknown_dedupe_mode() {
        with_env_vars(&[("SURVEY_DEDUPE_MODE", "bloom")], || {
            let err = Config::from_env().unwrap_err();
            assert!(format!("{err:#}").contains("SURVEY_DEDUPE_MODE"));
        });
    }

    #[test]
    fn config_rejects_bad_fsync() {
        with_env_vars(&[("SURVEY_FSYNC", "sometimes")], || {
            let err = Config::from_env().unwrap_err();
            assert!(err.to_string().contains("SURVEY_FSYNC"));
        });
    }

    #[test]
    fn config_rejects_bad_metrics_port() {
        with_env_vars(&[("SURVEY_METRICS_PORT", "70000")], || {
            let err = Config::from_env().unwrap_err();
            assert!(err.to_string().contains("SURVEY_METRICS_PORT"));
        });
    }

    #[test]
    fn parse_bool_variants() {
        assert_eq!(parse_bool(" TRUE "), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
