use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use file_rotate::{compression::Compression, suffix::AppendCount, ContentLimit, FileRotate};
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::ErrorClass;
use crate::AppError;

pub const LOG_ENV: &str = "LANDLORD_LOG";
pub const DEFAULT_FILTER: &str = "landlord=info,sqlx=warn";
pub const LOG_FILE_NAME: &str = "landlord.log";
const MAX_LOG_BYTES: usize = 5 * 1024 * 1024;
const MAX_LOG_FILES: usize = 3;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

#[cfg(unix)]
fn rotating_file(path: &Path) -> FileRotate<AppendCount> {
    FileRotate::new(
        path,
        AppendCount::new(MAX_LOG_FILES),
        ContentLimit::Bytes(MAX_LOG_BYTES),
        Compression::None,
        None,
    )
}

#[cfg(not(unix))]
fn rotating_file(path: &Path) -> FileRotate<AppendCount> {
    FileRotate::new(
        path,
        AppendCount::new(MAX_LOG_FILES),
        ContentLimit::Bytes(MAX_LOG_BYTES),
        Compression::None,
    )
}

/// Install the process-wide subscriber: human readable (or JSON) lines on
/// stderr. Safe to call more than once; later calls are ignored.
pub fn init_logging(json: bool) {
    let plain = (!json).then(|| {
        fmt::layer()
            .with_target(true)
            .with_timer(UtcTime::rfc_3339())
            .with_writer(std::io::stderr)
    });
    let structured = json.then(|| {
        fmt::layer()
            .json()
            .with_target(true)
            .with_timer(UtcTime::rfc_3339())
            .with_writer(std::io::stderr)
    });
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(plain)
        .with(structured)
        .try_init();
}

/// Like [`init_logging`] but also writes JSON lines to a size-rotated file
/// under `log_dir`. Keep the returned guard alive for the life of the process
/// or buffered lines are lost.
pub fn init_file_logging(json: bool, log_dir: &Path) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("create log dir {}", log_dir.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(rotating_file(&log_dir.join(LOG_FILE_NAME)));

    let plain = (!json).then(|| {
        fmt::layer()
            .with_target(true)
            .with_timer(UtcTime::rfc_3339())
            .with_writer(std::io::stderr)
    });
    let structured = json.then(|| {
        fmt::layer()
            .json()
            .with_target(true)
            .with_timer(UtcTime::rfc_3339())
            .with_writer(std::io::stderr)
    });
    let file = fmt::layer()
        .json()
        .with_ansi(false)
        .with_target(true)
        .with_timer(UtcTime::rfc_3339())
        .with_writer(writer);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(plain)
        .with(structured)
        .with(file)
        .try_init()
        .context("install tracing subscriber")?;
    info!(target: "landlord", event = "file_logging_ready", dir = %log_dir.display());
    Ok(guard)
}

fn context_to_json(context: &HashMap<String, String>) -> Option<Value> {
    if context.is_empty() {
        None
    } else {
        let mut map = Map::with_capacity(context.len());
        for (key, value) in context {
            map.insert(key.clone(), Value::String(value.clone()));
        }
        Some(Value::Object(map))
    }
}

fn wrap_details(value: Value) -> Value {
    if value.is_object() {
        value
    } else {
        json!({ "value": value })
    }
}

/// Enter/success/fail logging around one data operation.
pub struct OpScope {
    op: &'static str,
    owner_id: Option<String>,
    entity: Option<String>,
    start: Instant,
}

impl OpScope {
    pub fn new(op: &'static str, owner_id: Option<&str>, entity: Option<&str>) -> Self {
        let scope = Self {
            op,
            owner_id: owner_id.map(str::to_string),
            entity: entity.map(str::to_string),
            start: Instant::now(),
        };
        debug!(
            target: "landlord",
            op = scope.op,
            owner_id = scope.owner_id.as_deref(),
            entity = scope.entity.as_deref(),
            details = %json!({ "stage": "enter" })
        );
        scope
    }

    fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    pub fn success(&self, details: Value) {
        info!(
            target: "landlord",
            op = self.op,
            owner_id = self.owner_id.as_deref(),
            entity = self.entity.as_deref(),
            duration_ms = self.elapsed_ms(),
            details = %wrap_details(details)
        );
    }

    pub fn warn(&self, details: Value) {
        warn!(
            target: "landlord",
            op = self.op,
            owner_id = self.owner_id.as_deref(),
            entity = self.entity.as_deref(),
            duration_ms = self.elapsed_ms(),
            details = %wrap_details(details)
        );
    }

    pub fn fail(&self, err: &AppError) {
        let mut map = Map::new();
        map.insert("code".into(), Value::String(err.code().to_string()));
        map.insert("message".into(), Value::String(err.message().to_string()));
        if let Some(context) = context_to_json(err.context()) {
            map.insert("context".into(), context);
        }

        if matches!(err.class(), ErrorClass::Validation | ErrorClass::NotFound) {
            self.warn(Value::Object(map));
            return;
        }

        if let Some(crash) = err.crash_id() {
            map.insert("crash_id".into(), Value::String(crash.to_string()));
        }
        error!(
            target: "landlord",
            op = self.op,
            owner_id = self.owner_id.as_deref(),
            entity = self.entity.as_deref(),
            duration_ms = self.elapsed_ms(),
            details = %serde_json::Value::Object(map)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::codes;
    use std::sync::{Arc, Mutex as StdMutex};
    use tracing::subscriber::{self, DefaultGuard};

    struct BufferWriter(Arc<StdMutex<Vec<u8>>>);

    impl std::io::Write for BufferWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn init_buffer_subscriber() -> (Arc<StdMutex<Vec<u8>>>, DefaultGuard) {
        let buffer: Arc<StdMutex<Vec<u8>>> = Arc::new(StdMutex::new(Vec::new()));
        let writer = buffer.clone();
        let subscriber = fmt()
            .with_env_filter(EnvFilter::new("landlord=debug"))
            .with_writer(move || BufferWriter(writer.clone()))
            .json()
            .finish();
        let guard = subscriber::set_default(subscriber);
        (buffer, guard)
    }

    fn lines(buffer: &Arc<StdMutex<Vec<u8>>>) -> Vec<Value> {
        String::from_utf8(buffer.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn validation_failures_log_at_warn() {
        let (buffer, _guard) = init_buffer_subscriber();
        let scope = OpScope::new("contractor_create", Some("o1"), Some("contractor"));
        scope.fail(&AppError::new(codes::DUPLICATE_PHONE, "dup"));

        let logged = lines(&buffer);
        let last = logged.last().unwrap();
        assert_eq!(last["level"], "WARN");
        assert_eq!(last["fields"]["op"], "contractor_create");
    }

    #[test]
    fn other_failures_log_at_error_with_context() {
        let (buffer, _guard) = init_buffer_subscriber();
        let scope = OpScope::new("property_create", Some("o1"), None);
        scope.fail(&AppError::new("IO/FAIL", "disk").with_context("path", "x"));
        scope.success(json!("done"));

        let logged = lines(&buffer);
        let levels: Vec<_> = logged.iter().map(|l| l["level"].clone()).collect();
        assert_eq!(levels, vec![json!("DEBUG"), json!("ERROR"), json!("INFO")]);
        assert!(logged[1]["fields"]["details"]
            .as_str()
            .unwrap()
            .contains("\"path\":\"x\""));
    }
}
