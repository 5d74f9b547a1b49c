//! Global application configuration manager.
//!
//! `AppConfig` is a lazily initialized, globally accessible singleton containing
//! runtime configuration values loaded from environment variables. It provides
//! thread-safe access and mutation for testing or overrides in runtime environments.

use std::env;
use std::sync::{OnceLock, RwLock};

/// Represents the complete application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub project_name: String,
    pub log_level: String,
    pub log_file: String,
    pub log_to_stdout: bool,
    pub database_path: String,
    pub storage_root: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_duration_minutes: u64,
    pub refresh_duration_days: u64,
    pub ai_host: String,
    pub ai_model: String,
    pub ai_timeout_seconds: u64,
}

/// Lazily-initialized, thread-safe singleton instance of `AppConfig`.
static CONFIG_INSTANCE: OnceLock<RwLock<AppConfig>> = OnceLock::new();

impl AppConfig {
    /// Loads the configuration from `.env` and environment variables.
    ///
    /// This method is used internally to populate the singleton. It panics
    /// if required variables are missing or improperly formatted.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            env: env::var("APP_ENV").unwrap_or_else(|_| "development".into()),
            project_name: env::var("PROJECT_NAME").unwrap_or_else(|_| "tutoria".into()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "api=info".into()),
            log_file: env::var("LOG_FILE").unwrap_or_else(|_| "api.log".into()),
            log_to_stdout: env::var("LOG_TO_STDOUT").unwrap_or_else(|_| "false".into()) == "true",
            database_path: env::var("DATABASE_PATH").expect("DATABASE_PATH is required"),
            storage_root: env::var("STORAGE_ROOT").expect("STORAGE_ROOT is required"),
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".into())
                .parse()
                .expect("PORT must be a number"),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET is required"),
            jwt_duration_minutes: env::var("JWT_DURATION_MINUTES")
                .unwrap_or("30".into())
                .parse()
                .expect("JWT_DURATION_MINUTES must be a number"),
            refresh_duration_days: env::var("REFRESH_DURATION_DAYS")
                .unwrap_or("7".into())
                .parse()
                .expect("REFRESH_DURATION_DAYS must be a number"),
            ai_host: env::var("AI_HOST").unwrap_or_else(|_| "http://localhost:11434".into()),
            ai_model: env::var("AI_MODEL").unwrap_or_else(|_| "qwen2.5-coder:7b".into()),
            ai_timeout_seconds: env::var("AI_TIMEOUT_SECONDS")
                .unwrap_or("300".into())
                .parse()
                .expect("AI_TIMEOUT_SECONDS must be a number"),
        }
    }

    /// Returns a shared reference to the global configuration.
    ///
    /// # Panics
    /// Panics if the lock cannot be acquired.
    pub fn global() -> std::sync::RwLockReadGuard<'static, AppConfig> {
        CONFIG_INSTANCE
            .get_or_init(|| RwLock::new(AppConfig::from_env()))
            .read()
            .expect("Failed to acquire AppConfig read lock")
    }

    /// Resets the configuration by reloading from environment variables.
    ///
    /// Useful in tests to clear overrides.
    pub fn reset() {
        if let Some(lock) = CONFIG_INSTANCE.get() {
            let mut guard = lock.write().expect("Failed to acquire AppConfig write lock");
            *guard = AppConfig::from_env();
        }
    }

    /// Generic internal setter for any field in the config.
    ///
    /// Used by public per-field setter methods.
    fn set_field<F>(setter: F)
    where
        F: FnOnce(&mut AppConfig),
    {
        let lock = CONFIG_INSTANCE.get_or_init(|| RwLock::new(AppConfig::from_env()));
        let mut guard = lock
            .write()
            .expect("Failed to acquire AppConfig write lock");
        setter(&mut guard);
    }

    // --- Per-field setters below ---

    pub fn set_env(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.env = value.into());
    }

    pub fn set_project_name(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.project_name = value.into());
    }

    pub fn set_log_level(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.log_level = value.into());
    }

    pub fn set_log_file(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.log_file = value.into());
    }

    pub fn set_log_to_stdout(value: bool) {
        AppConfig::set_field(|cfg| cfg.log_to_stdout = value);
    }

    pub fn set_database_path(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.database_path = value.into());
    }

    pub fn set_storage_root(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.storage_root = value.into());
    }

    pub fn set_host(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.host = value.into());
    }

    pub fn set_port(value: u16) {
        AppConfig::set_field(|cfg| cfg.port = value);
    }

    pub fn set_jwt_secret(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.jwt_secret = value.into());
    }

    pub fn set_jwt_duration_minutes(value: impl Into<u64>) {
        AppConfig::set_field(|cfg| cfg.jwt_duration_minutes = value.into());
    }

    pub fn set_refresh_duration_days(value: impl Into<u64>) {
        AppConfig::set_field(|cfg| cfg.refresh_duration_days = value.into());
    }

    pub fn set_ai_host(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.ai_host = value.into());
    }

    pub fn set_ai_model(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.ai_model = value.into());
    }

    pub fn set_ai_timeout_seconds(value: impl Into<u64>) {
        AppConfig::set_field(|cfg| cfg.ai_timeout_seconds = value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn set_required_env() {
        unsafe {
            std::env::set_var("DATABASE_PATH", "data/test.db");
            std::env::set_var("STORAGE_ROOT", "data/storage");
            std::env::set_var("JWT_SECRET", "test-secret");
        }
    }

    #[test]
    #[serial]
    fn defaults_are_applied_for_optional_fields() {
        set_required_env();
        unsafe {
            std::env::remove_var("JWT_DURATION_MINUTES");
            std::env::remove_var("REFRESH_DURATION_DAYS");
            std::env::remove_var("AI_TIMEOUT_SECONDS");
        }
        let cfg = AppConfig::from_env();
        assert_eq!(cfg.jwt_duration_minutes, 30);
        assert_eq!(cfg.refresh_duration_days, 7);
        assert_eq!(cfg.ai_timeout_seconds, 300);
    }

    #[test]
    #[serial]
    fn setters_override_global_values() {
        set_required_env();
        AppConfig::set_jwt_secret("overridden");
        assert_eq!(AppConfig::global().jwt_secret, "overridden");
        AppConfig::reset();
    }
}
