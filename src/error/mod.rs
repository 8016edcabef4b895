use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;

use anyhow::Error as AnyhowError;
use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeJsonError;
use sqlx::Error as SqlxError;
use std::io::Error as IoError;
use tracing::{error, warn};
use ts_rs::TS;

mod crash_id;

pub use crash_id::CrashId;

/// Stable error codes shared by the stores, the pipeline and the CLI.
pub mod codes {
    pub const VALIDATION: &str = "VALIDATION/INVALID";
    pub const DUPLICATE_PHONE: &str = "CONTRACTOR/DUPLICATE_PHONE";
    pub const PLAN_LIMIT: &str = "PLAN/LIMIT_REACHED";
    pub const PERMISSION_DENIED: &str = "STORE/PERMISSION_DENIED";
    pub const NOT_FOUND: &str = "STORE/NOT_FOUND";
    pub const ALREADY_EXISTS: &str = "STORE/ALREADY_EXISTS";
    pub const UNDEFINED_FIELD: &str = "STORE/UNDEFINED_FIELD";
    pub const INVALID_LOCATOR: &str = "STORE/INVALID_LOCATOR";
    pub const DECODE: &str = "STORE/DECODE";
    pub const MISSING_PARAM: &str = "ROUTE/MISSING_PARAM";
    pub const SESSION_PENDING: &str = "SESSION/PENDING";
    pub const SESSION_SIGNED_OUT: &str = "SESSION/SIGNED_OUT";
    pub const LIFECYCLE_TRANSITION: &str = "LIFECYCLE/INVALID_TRANSITION";
    pub const LIFECYCLE_DECLINED: &str = "LIFECYCLE/DECLINED";
    pub const PANIC: &str = "RUNTIME/PANIC";
    pub const UNSUPPORTED_UPLOAD: &str = "VALIDATION/UNSUPPORTED_FILE";
}

/// Coarse grouping of error codes that decides how a failure is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Caught before any network call; rendered inline.
    Validation,
    /// A write was attempted and rejected by the store's access rules.
    Permission,
    /// Missing route context or missing document.
    NotFound,
    /// Anything else: IO, database, unknown. Surfaced with a retry hint.
    Transient,
}

/// Error carried from the stores through the pipeline to toasts and exit codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AppError {
    /// `AREA/REASON`, see [`codes`].
    pub code: String,
    /// Shown to the user as is.
    pub message: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    #[ts(as = "Option<HashMap<String, String>>", optional)]
    pub context: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub cause: Option<Box<AppError>>,
    /// Set when the error came from a caught panic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional, type = "string")]
    pub crash_id: Option<CrashId>,
}

pub type AppResult<T> = std::result::Result<T, AppError>;

impl AppError {
    pub const UNKNOWN_CODE: &'static str = "APP/UNKNOWN";
    pub const GENERIC_CODE: &'static str = "APP/GENERIC";

    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        AppError {
            code: code.into(),
            message: message.into(),
            context: HashMap::new(),
            cause: None,
            crash_id: None,
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::new(codes::NOT_FOUND, "Record not found").with_context("path", what)
    }

    pub fn permission_denied(path: impl Into<String>) -> Self {
        AppError::new(
            codes::PERMISSION_DENIED,
            "You don't have permission to change this record.",
        )
        .with_context("path", path)
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> &HashMap<String, String> {
        &self.context
    }

    pub fn cause(&self) -> Option<&AppError> {
        self.cause.as_deref()
    }

    pub fn crash_id(&self) -> Option<&CrashId> {
        self.crash_id.as_ref()
    }

    pub fn set_crash_id(&mut self, id: CrashId) {
        self.crash_id = Some(id);
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_cause(mut self, cause: impl Into<AppError>) -> Self {
        self.cause = Some(Box::new(cause.into()));
        self
    }

    /// Validation failures never reached the store; everything unrecognised
    /// is treated as transient and gets a retry hint.
    pub fn class(&self) -> ErrorClass {
        let code = self.code.as_str();
        if code.starts_with("VALIDATION/")
            || code.starts_with("LIFECYCLE/")
            || code == codes::DUPLICATE_PHONE
            || code == codes::PLAN_LIMIT
        {
            ErrorClass::Validation
        } else if code == codes::PERMISSION_DENIED {
            ErrorClass::Permission
        } else if code == codes::NOT_FOUND
            || code.starts_with("ROUTE/")
            || code.starts_with("SESSION/")
        {
            ErrorClass::NotFound
        } else {
            ErrorClass::Transient
        }
    }

    /// Validation and not-found are expected and log at warn.
    pub fn log_with_event(&self, event: &'static str) {
        let crash_id = self.crash_id.as_ref().map(|id| id.to_string());
        match self.class() {
            ErrorClass::Validation | ErrorClass::NotFound => warn!(
                target: "landlord",
                event,
                code = %self.code,
                message = %self.message,
                context = ?self.context
            ),
            ErrorClass::Permission | ErrorClass::Transient => error!(
                target: "landlord",
                event,
                code = %self.code,
                message = %self.message,
                context = ?self.context,
                crash_id = crash_id.as_deref()
            ),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.context.is_empty() {
            write!(f, "[{}] {}", self.code, self.message)
        } else {
            write!(f, "[{}] {} ({:?})", self.code, self.message, self.context)
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

impl From<&str> for AppError {
    fn from(message: &str) -> Self {
        AppError::new(AppError::GENERIC_CODE, message)
    }
}

impl From<String> for AppError {
    fn from(message: String) -> Self {
        AppError::new(AppError::GENERIC_CODE, message)
    }
}

impl From<AnyhowError> for AppError {
    fn from(error: AnyhowError) -> Self {
        fn convert(err: &(dyn StdError + 'static)) -> AppError {
            if let Some(app) = err.downcast_ref::<AppError>() {
                return app.clone();
            }

            let mut root = AppError::new(AppError::UNKNOWN_CODE, err.to_string());
            if let Some(source) = err.source() {
                root.cause = Some(Box::new(convert(source)));
            }
            root
        }

        convert(error.as_ref())
    }
}

impl From<IoError> for AppError {
    fn from(error: IoError) -> Self {
        let code = format!("IO/{:?}", error.kind());
        let mut app_error = AppError::new(code, error.to_string());
        if let Some(os_code) = error.raw_os_error() {
            app_error = app_error.with_context("os_code", os_code.to_string());
        }
        app_error
    }
}

impl From<SerdeJsonError> for AppError {
    fn from(error: SerdeJsonError) -> Self {
        let code = if error.is_data() {
            "JSON/DATA"
        } else if error.is_syntax() {
            "JSON/SYNTAX"
        } else if error.is_eof() {
            "JSON/EOF"
        } else if error.is_io() {
            "JSON/IO"
        } else {
            "JSON/ERROR"
        };

        let mut app_error = AppError::new(code, error.to_string());
        let line = error.line();
        if line > 0 {
            app_error = app_error.with_context("line", line.to_string());
        }
        let column = error.column();
        if column > 0 {
            app_error = app_error.with_context("column", column.to_string());
        }
        app_error
    }
}

impl From<SqlxError> for AppError {
    fn from(error: SqlxError) -> Self {
        match error {
            SqlxError::RowNotFound => AppError::new(codes::NOT_FOUND, "Record not found"),
            SqlxError::ColumnNotFound(name) => {
                AppError::new("SQLX/COLUMN_NOT_FOUND", format!("Column not found: {name}"))
            }
            SqlxError::PoolTimedOut => AppError::new(
                "SQLX/POOL_TIMEOUT",
                "Timed out acquiring a database connection",
            ),
            SqlxError::PoolClosed => AppError::new("SQLX/POOL_CLOSED", "Database pool is closed"),
            SqlxError::Io(err) => AppError::from(err).with_context("source", "sqlx"),
            SqlxError::Database(db) => {
                let code = db
                    .code()
                    .map(|code| format!("Sqlite/{code}"))
                    .unwrap_or_else(|| "SQLX/DATABASE".to_string());
                let mut app_error = AppError::new(code, db.message().to_string());
                if let Some(constraint) = db.constraint() {
                    app_error = app_error.with_context("constraint", constraint.to_string());
                }
                app_error
            }
            SqlxError::ColumnDecode { index, source } => {
                AppError::new("SQLX/COLUMN_DECODE", source.to_string())
                    .with_context("column_index", index.to_string())
            }
            SqlxError::Decode(decode_err) => AppError::new("SQLX/DECODE", decode_err.to_string()),
            other => AppError::new("SQLX/ERROR", other.to_string()),
        }
    }
}
