//! Logging Infrastructure
//!
//! Console output (pretty or JSON) plus optional daily rolling files:
//! - `app/app.YYYY-MM-DD` for everything except audit and security events
//! - `audit/audit.YYYY-MM-DD` for the `audit` target
//! - `security/security.YYYY-MM-DD` for the `security` target

use std::fs;
use std::path::Path;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::Layered;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, Registry, filter::filter_fn, fmt, prelude::*};

type BaseSubscriber = Layered<EnvFilter, Registry>;
type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync>;

const AUDIT_TARGET: &str = "audit";
const SECURITY_TARGET: &str = "security";

/// Keeps the non-blocking file writers alive; drop flushes them
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _guards: Vec<WorkerGuard>,
}

/// Initialize the logging system
///
/// `RUST_LOG` wins over `level` when set.
///
/// ```no_run
/// // Development (console only)
/// let _guard = label_server::utils::logger::init_logger("debug", false, None)?;
///
/// // Production (JSON console + files)
/// let _guard = label_server::utils::logger::init_logger("info", true, Some("./work_dir/logs"))?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn init_logger(level: &str, json_format: bool, log_dir: Option<&str>) -> anyhow::Result<LogGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let mut layers: Vec<BoxedLayer<BaseSubscriber>> = Vec::new();
    layers.push(if json_format {
        fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        fmt::layer().with_target(true).with_line_number(true).boxed()
    });

    let mut guards = Vec::new();
    if let Some(dir) = log_dir {
        let root = Path::new(dir);
        let targets: [(&str, fn(&str) -> bool); 3] = [
            ("app", |t| t != AUDIT_TARGET && t != SECURITY_TARGET),
            (AUDIT_TARGET, |t| t == AUDIT_TARGET),
            (SECURITY_TARGET, |t| t == SECURITY_TARGET),
        ];
        for (name, accepts) in targets {
            let (layer, guard) = file_layer(root, name, json_format, accepts)?;
            layers.push(layer);
            guards.push(guard);
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()?;

    Ok(LogGuard { _guards: guards })
}

fn file_layer<S>(
    root: &Path,
    name: &str,
    json_format: bool,
    accepts: fn(&str) -> bool,
) -> anyhow::Result<(BoxedLayer<S>, WorkerGuard)>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let dir = root.join(name);
    fs::create_dir_all(&dir)?;

    let appender = RollingFileAppender::new(Rotation::DAILY, dir, name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = filter_fn(move |meta| accepts(meta.target()));

    let layer = if json_format {
        fmt::layer()
            .json()
            .with_target(true)
            .with_writer(writer)
            .with_filter(filter)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_ansi(false)
            .with_writer(writer)
            .with_filter(filter)
            .boxed()
    };
    Ok((layer, guard))
}

/// Audit log helper - records business operations on the `audit` target
///
/// ```ignore
/// audit_log!(user_id.to_string(), "submit_batch", "labels", "3 new, 1 duplicate");
/// ```
#[macro_export]
macro_rules! audit_log {
    ($user_id:expr, $action:expr, $resource:expr) => {
        tracing::info!(
            target: "audit",
            user_id = %$user_id,
            action = $action,
            resource = %$resource,
            timestamp = chrono::Local::now().to_rfc3339(),
            "AUDIT"
        );
    };
    ($user_id:expr, $action:expr, $resource:expr, $details:expr) => {
        tracing::info!(
            target: "audit",
            user_id = %$user_id,
            action = $action,
            resource = %$resource,
            details = %$details,
            timestamp = chrono::Local::now().to_rfc3339(),
            "AUDIT"
        );
    };
}

/// Security log helper - records identity problems on the `security` target
///
/// ```ignore
/// security_log!(WARN, "identity_missing", uri = %parts.uri);
/// ```
#[macro_export]
macro_rules! security_log {
    (WARN, $event:expr, $($arg:tt)*) => {
        tracing::warn!(
            target: "security",
            event = $event,
            timestamp = chrono::Local::now().to_rfc3339(),
            $($arg)*
        );
    };
    (INFO, $event:expr, $($arg:tt)*) => {
        tracing::info!(
            target: "security",
            event = $event,
            timestamp = chrono::Local::now().to_rfc3339(),
            $($arg)*
        );
    };
}
