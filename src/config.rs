use std::path::{Path, PathBuf};

use crate::{AppError, AppResult};

pub const DATA_DIR_ENV: &str = "LANDLORD_DATA_DIR";
pub const PUBLIC_URL_ENV: &str = "LANDLORD_PUBLIC_URL";
pub const LOG_JSON_ENV: &str = "LANDLORD_LOG_JSON";

const APP_DIR: &str = "landlord";
const DB_FILE: &str = "landlord.sqlite3";

/// Where the CLI keeps its data and how it names uploaded objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub public_base_url: String,
    pub log_json: bool,
}

impl AppConfig {
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary variable source so tests never touch the
    /// process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let data_dir = match lookup(DATA_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir()?,
        };
        let public_base_url = lookup(PUBLIC_URL_ENV)
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| file_url(&data_dir.join("objects")));
        let log_json = lookup(LOG_JSON_ENV)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        Ok(Self {
            data_dir,
            public_base_url,
            log_json,
        })
    }

    /// Move the data directory. A public URL still pointing at the old
    /// objects dir follows the move; an explicit one is kept.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let derived = self.public_base_url == file_url(&self.objects_dir());
        self.data_dir = dir.into();
        if derived {
            self.public_base_url = file_url(&self.objects_dir());
        }
        self
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE)
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.data_dir.join("objects")
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.data_dir.join("exports")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

fn default_data_dir() -> AppResult<PathBuf> {
    let base = dirs::data_dir()
        .or_else(|| std::env::current_dir().ok())
        .ok_or_else(|| AppError::new("CONFIG/NO_DATA_DIR", "Could not determine a data directory"))?;
    Ok(base.join(APP_DIR))
}

fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn explicit_values_win() {
        let cfg = AppConfig::from_lookup(lookup(&[
            (DATA_DIR_ENV, "/srv/landlord"),
            (PUBLIC_URL_ENV, "https://cdn.example.com/"),
            (LOG_JSON_ENV, "true"),
        ]))
        .unwrap();
        assert_eq!(cfg.db_path(), PathBuf::from("/srv/landlord/landlord.sqlite3"));
        assert_eq!(cfg.public_base_url, "https://cdn.example.com");
        assert!(cfg.log_json);
    }

    #[test]
    fn public_url_defaults_to_local_objects_dir() {
        let cfg = AppConfig::from_lookup(lookup(&[(DATA_DIR_ENV, "/tmp/ll")])).unwrap();
        assert_eq!(cfg.public_base_url, "file:///tmp/ll/objects");
        assert!(!cfg.log_json);
        assert_eq!(cfg.log_dir(), PathBuf::from("/tmp/ll/logs"));
    }

    #[test]
    fn moving_the_data_dir_moves_a_derived_public_url() {
        let cfg = AppConfig::from_lookup(lookup(&[(DATA_DIR_ENV, "/tmp/ll")]))
            .unwrap()
            .with_data_dir("/var/ll");
        assert_eq!(cfg.public_base_url, "file:///var/ll/objects");
        assert_eq!(cfg.db_path(), PathBuf::from("/var/ll/landlord.sqlite3"));

        let cfg = AppConfig::from_lookup(lookup(&[
            (DATA_DIR_ENV, "/tmp/ll"),
            (PUBLIC_URL_ENV, "https://cdn.example.com"),
        ]))
        .unwrap()
        .with_data_dir("/var/ll");
        assert_eq!(cfg.public_base_url, "https://cdn.example.com");
    }
}
