//! Application configuration.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use valuta_rates::RatesConfig;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable lines.
    Human,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "human" | "text" | "pretty" => Ok(LogFormat::Human),
            other => Err(format!("Unknown log format '{}'", other)),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory holding every data file.
    pub data_dir: PathBuf,
    /// Users file name inside `data_dir`.
    pub users_file: String,
    /// Portfolios file name inside `data_dir`.
    pub portfolios_file: String,
    /// Directory for the rotating action log.
    pub logs_dir: PathBuf,
    /// Log format.
    pub log_format: LogFormat,
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Rate engine configuration.
    pub rates: RatesConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = PathBuf::from("data");
        Self {
            rates: RatesConfig::default().with_data_dir(&data_dir),
            data_dir,
            users_file: "users.json".to_string(),
            portfolios_file: "portfolios.json".to_string(),
            logs_dir: PathBuf::from("logs"),
            log_format: LogFormat::Human,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Use `dir` for the wallet files and the rate files.
    pub fn with_data_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.data_dir = dir.as_ref().to_path_buf();
        self.rates = self.rates.with_data_dir(dir);
        self
    }

    /// Read `.env`, or `path` when given, into the process environment.
    ///
    /// Variables already set in the process win over the file. Returns
    /// whether a file was loaded; a missing file is not an error.
    pub fn load_env_file(path: Option<&Path>) -> bool {
        match path {
            Some(path) => dotenv::from_path(path).is_ok(),
            None => dotenv::dotenv().is_ok(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self {
            rates: RatesConfig::from_env(),
            ..Self::default()
        };

        if let Ok(dir) = std::env::var("VALUTA_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        if let Ok(name) = std::env::var("VALUTA_USERS_FILE") {
            config.users_file = name;
        }

        if let Ok(name) = std::env::var("VALUTA_PORTFOLIOS_FILE") {
            config.portfolios_file = name;
        }

        if let Ok(dir) = std::env::var("VALUTA_LOGS_DIR") {
            config.logs_dir = PathBuf::from(dir);
        }

        if let Ok(format) = std::env::var("VALUTA_LOG_FORMAT") {
            config.log_format = format.parse().unwrap_or(LogFormat::Human);
        }

        if let Ok(level) = std::env::var("VALUTA_LOG_LEVEL") {
            config.log_level = level;
        }

        config
    }

    pub fn users_path(&self) -> PathBuf {
        self.data_dir.join(&self.users_file)
    }

    pub fn portfolios_path(&self) -> PathBuf {
        self.data_dir.join(&self.portfolios_file)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.users_file.trim().is_empty() || self.portfolios_file.trim().is_empty() {
            return Err("Users and portfolios file names cannot be empty".to_string());
        }

        if self.logs_dir.as_os_str().is_empty() {
            return Err("Logs directory cannot be empty".to_string());
        }

        if self.users_file == self.portfolios_file {
            return Err("Users and portfolios must use different files".to_string());
        }

        let wallet_files = [self.users_path(), self.portfolios_path()];
        if wallet_files.contains(&self.rates.rates_file) || wallet_files.contains(&self.rates.history_file) {
            return Err("Wallet files cannot share a path with the rate files".to_string());
        }

        self.rates.validate()
    }
}
