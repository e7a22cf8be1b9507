use crate::core::{Result, ServerError};
use crate::printing::dispatcher::DEFAULT_RUN_SIZE;
use crate::printing::{PipelineOptions, PrinterMode, RenderConfig};
use crate::printing::renderer::{DEFAULT_PLANT_UNIT, DEFAULT_QR_BASE_URL};
use shared::models::{DEFAULT_MAX_RETRIES, FailureAttribution};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Server configuration
///
/// # Environment
///
/// Every field can be overridden through the environment:
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | WORK_DIR | ./work_dir | database and spool root |
/// | HTTP_PORT | 3000 | HTTP API port |
/// | ENVIRONMENT | development | environment name |
/// | LOG_LEVEL | info | log level (RUST_LOG wins when set) |
/// | LOG_JSON | false | JSON console logs |
/// | LOG_DIR | unset | daily rolling log files |
/// | PRINTER_MODE | spool | `network` or `spool` |
/// | PRINTER_ADDR | 127.0.0.1:9100 | network printer address |
/// | PRINTER_SPOOL_DIR | WORK_DIR/printers/zpl | spool directory |
/// | PRINTER_TIMEOUT_MS | 5000 | printer connect/write timeout |
/// | DISPATCH_TIMEOUT_MS | 30000 | per-document dispatch timeout |
/// | DISPATCH_RUN_SIZE | 8 | most jobs claimed by one dispatch run |
/// | FAILURE_ATTRIBUTION | batch | `batch` or `per_document` |
/// | MAX_RETRIES | 3 | retry budget per job |
/// | AUTO_DISPATCH | true | dispatch right after intake |
/// | DISPATCH_INTERVAL_SECS | 0 | periodic pending sweep (0 = off) |
/// | RECONCILE_INTERVAL_SECS | 60 | stale dispatch sweep period |
/// | STALE_DISPATCH_SECS | 300 | age at which a dispatch counts as stale |
///
/// `STALE_DISPATCH_SECS` must be longer than
/// `DISPATCH_TIMEOUT_MS × (DISPATCH_RUN_SIZE + 1)`; see [`Config::validate`].
/// | QR_BASE_URL | https://madeinindia.qcin.org/product-details | URL QR prefix |
/// | PLANT_UNIT | SAIL-BSP | unit written into the data QR |
/// | SHUTDOWN_TIMEOUT_MS | 10000 | graceful shutdown budget |
///
/// ```ignore
/// WORK_DIR=/data/labels PRINTER_MODE=network PRINTER_ADDR=10.0.0.9:9100 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub work_dir: String,
    pub http_port: u16,
    /// development | staging | production
    pub environment: String,

    pub log_level: String,
    pub log_json: bool,
    pub log_dir: Option<String>,

    pub printer_mode: PrinterMode,
    pub printer_addr: String,
    pub printer_spool_dir: Option<String>,
    pub printer_timeout_ms: u64,

    pub dispatch_timeout_ms: u64,
    pub dispatch_run_size: usize,
    pub failure_attribution: FailureAttribution,
    pub max_retries: u32,
    pub auto_dispatch: bool,
    pub dispatch_interval_secs: u64,
    pub reconcile_interval_secs: u64,
    pub stale_dispatch_secs: u64,

    pub qr_base_url: String,
    pub plant_unit: String,

    pub shutdown_timeout_ms: u64,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

impl Config {
    /// Load from the environment, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            work_dir: env_string("WORK_DIR", "./work_dir"),
            http_port: env_or("HTTP_PORT", 3000),
            environment: env_string("ENVIRONMENT", "development"),

            log_level: env_string("LOG_LEVEL", "info"),
            log_json: env_or("LOG_JSON", false),
            log_dir: std::env::var("LOG_DIR").ok().filter(|d| !d.is_empty()),

            printer_mode: env_or("PRINTER_MODE", PrinterMode::Spool),
            printer_addr: env_string("PRINTER_ADDR", "127.0.0.1:9100"),
            printer_spool_dir: std::env::var("PRINTER_SPOOL_DIR").ok().filter(|d| !d.is_empty()),
            printer_timeout_ms: env_or("PRINTER_TIMEOUT_MS", 5000),

            dispatch_timeout_ms: env_or("DISPATCH_TIMEOUT_MS", 30000),
            dispatch_run_size: env_or("DISPATCH_RUN_SIZE", DEFAULT_RUN_SIZE),
            failure_attribution: env_or("FAILURE_ATTRIBUTION", FailureAttribution::Batch),
            max_retries: env_or("MAX_RETRIES", DEFAULT_MAX_RETRIES),
            auto_dispatch: env_or("AUTO_DISPATCH", true),
            dispatch_interval_secs: env_or("DISPATCH_INTERVAL_SECS", 0),
            reconcile_interval_secs: env_or("RECONCILE_INTERVAL_SECS", 60),
            stale_dispatch_secs: env_or("STALE_DISPATCH_SECS", 300),

            qr_base_url: env_string("QR_BASE_URL", DEFAULT_QR_BASE_URL),
            plant_unit: env_string("PLANT_UNIT", DEFAULT_PLANT_UNIT),

            shutdown_timeout_ms: env_or("SHUTDOWN_TIMEOUT_MS", 10000),
        }
    }

    /// Environment config rooted at another work dir
    ///
    /// Mostly for tests.
    pub fn with_work_dir(work_dir: impl Into<String>) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.printer_spool_dir = None;
        config
    }

    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("database").join("labels.redb")
    }

    pub fn spool_dir(&self) -> PathBuf {
        match &self.printer_spool_dir {
            Some(dir) => PathBuf::from(dir),
            None => PathBuf::from(&self.work_dir).join("printers").join("zpl"),
        }
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            max_retries: self.max_retries,
            failure_attribution: self.failure_attribution,
            dispatch_timeout: Duration::from_millis(self.dispatch_timeout_ms),
            dispatch_run_size: self.dispatch_run_size,
            auto_dispatch: self.auto_dispatch,
            render: RenderConfig {
                qr_base_url: self.qr_base_url.clone(),
                plant_unit: self.plant_unit.clone(),
            },
        }
    }

    /// Reject settings under which the stale sweep could fail a job whose
    /// dispatch run is still delivering
    pub fn validate(&self) -> Result<()> {
        if self.dispatch_run_size == 0 {
            return Err(ServerError::Config("DISPATCH_RUN_SIZE must be at least 1".into()));
        }
        let run_floor_ms = (self.dispatch_run_size as u64 + 1).saturating_mul(self.dispatch_timeout_ms);
        if self.stale_dispatch_secs.saturating_mul(1000) <= run_floor_ms {
            return Err(ServerError::Config(format!(
                "STALE_DISPATCH_SECS ({}s) must exceed DISPATCH_TIMEOUT_MS x (DISPATCH_RUN_SIZE + 1) ({}ms)",
                self.stale_dispatch_secs, run_floor_ms
            )));
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_paths() {
        let config = Config::with_work_dir("/tmp/labels");
        assert_eq!(
            config.database_path(),
            PathBuf::from("/tmp/labels/database/labels.redb")
        );
        assert_eq!(config.spool_dir(), PathBuf::from("/tmp/labels/printers/zpl"));
    }

    #[test]
    fn test_pipeline_options_follow_config() {
        let mut config = Config::with_work_dir("/tmp/labels");
        config.max_retries = 5;
        config.failure_attribution = FailureAttribution::PerDocument;
        config.dispatch_timeout_ms = 1500;
        config.dispatch_run_size = 4;
        config.plant_unit = "UNIT-7".into();

        let options = config.pipeline_options();
        assert_eq!(options.max_retries, 5);
        assert_eq!(options.failure_attribution, FailureAttribution::PerDocument);
        assert_eq!(options.dispatch_timeout, Duration::from_millis(1500));
        assert_eq!(options.dispatch_run_size, 4);
        assert_eq!(options.render.plant_unit, "UNIT-7");
    }

    #[test]
    fn test_stale_threshold_must_outlast_a_dispatch_run() {
        let mut config = Config::with_work_dir("/tmp/labels");
        config.dispatch_timeout_ms = 30_000;
        config.dispatch_run_size = 8;
        config.stale_dispatch_secs = 300;
        assert!(config.validate().is_ok());

        // 11 documents at 30s each outlast a 300s threshold
        config.dispatch_run_size = 11;
        assert!(matches!(config.validate(), Err(ServerError::Config(_))));

        config.dispatch_run_size = 8;
        config.stale_dispatch_secs = 270;
        assert!(matches!(config.validate(), Err(ServerError::Config(_))));

        config.stale_dispatch_secs = 300;
        config.dispatch_run_size = 0;
        assert!(matches!(config.validate(), Err(ServerError::Config(_))));
    }

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        assert_eq!(env_or("LABEL_SERVER_TEST_UNSET_VARIABLE", 42u16), 42);
    }
}
