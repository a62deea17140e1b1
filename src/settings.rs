use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::webauthn::WebAuthnSettings;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub webauthn: WebAuthnSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    /// Folder served under `/static`
    pub static_folder: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            static_folder: "static".to_string(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from configuration files and environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Settings file cannot be read or parsed
    /// - Logger initialization fails
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        Self::load_env_file();

        // Load base settings from TOML or defaults
        let mut settings = Self::load_base_settings()?;

        // Apply environment variable overrides
        Self::apply_env_overrides(&mut settings);

        settings.init_logging()?;
        Ok(settings)
    }

    /// Parse settings from TOML text; missing keys keep their defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed.
    pub fn from_toml_str(toml_content: &str) -> Result<Self, basic_toml::Error> {
        basic_toml::from_str(toml_content)
    }

    /// Load base settings from TOML file(s) or use defaults
    /// Settings are loaded with the following priority (highest to lowest):
    /// 1. Environment variables (applied separately after loading base settings)
    /// 2. Settings.toml in `WEBAUTHN_RP_SECRETS_DIR` (if specified and exists)
    /// 3. Settings.toml in current directory (if exists)
    /// 4. Default settings
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Settings file cannot be read
    /// - TOML parsing fails
    fn load_base_settings() -> Result<Self, Box<dyn std::error::Error>> {
        let mut settings = Self::default();

        let default_config_path = Path::new("Settings.toml");
        if default_config_path.exists() {
            settings = Self::from_file(default_config_path)?;
            println!(
                "✓ Loaded base settings from {}",
                default_config_path.display()
            );
        }

        if let Ok(secrets_dir) = std::env::var("WEBAUTHN_RP_SECRETS_DIR") {
            let secrets_path = Path::new(&secrets_dir).join("Settings.toml");
            if secrets_path.exists() {
                settings = Self::from_file(&secrets_path)?;
                println!("✓ Overriding settings from {}", secrets_path.display());
            } else {
                println!(
                    "ℹ WEBAUTHN_RP_SECRETS_DIR set but no Settings.toml found at: {}",
                    secrets_path.display()
                );
            }
        }

        Ok(settings)
    }

    /// Read and parse one settings file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let toml_content = fs::read_to_string(path)?;
        Ok(Self::from_toml_str(&toml_content)?)
    }

    /// Apply environment variable overrides to settings
    pub fn apply_env_overrides(settings: &mut Self) {
        Self::apply_application_env_overrides(&mut settings.application);
        Self::apply_webauthn_env_overrides(&mut settings.webauthn);
        Self::apply_logging_env_overrides(&mut settings.logging);
    }

    fn apply_application_env_overrides(app_settings: &mut ApplicationSettings) {
        if let Ok(host) = std::env::var("HOST") {
            app_settings.host = host;
        }
        if let Ok(port_str) = std::env::var("PORT") {
            if let Ok(port) = port_str.parse::<u16>() {
                app_settings.port = port;
            }
        }
        if let Ok(static_folder) = std::env::var("STATIC_FOLDER_PATH") {
            app_settings.static_folder = static_folder;
        }
    }

    fn apply_webauthn_env_overrides(webauthn: &mut WebAuthnSettings) {
        if let Ok(rp_id) = std::env::var("RP_ID") {
            webauthn.rp_id = rp_id;
        }
        if let Ok(rp_name) = std::env::var("RP_NAME") {
            webauthn.rp_name = rp_name;
        }
        if let Ok(origins) = std::env::var("RP_ORIGINS") {
            webauthn.rp_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
                .collect();
        }
        if let Ok(timeout_str) = std::env::var("WEBAUTHN_TIMEOUT_MS") {
            if let Ok(timeout) = timeout_str.parse::<u32>() {
                webauthn.timeout_ms = timeout;
            }
        }
        if let Ok(user_verification) = std::env::var("USER_VERIFICATION") {
            webauthn.user_verification = user_verification;
        }
        if let Ok(attestation) = std::env::var("ATTESTATION") {
            webauthn.attestation = attestation;
        }
        if let Ok(aaguid_file) = std::env::var("AAGUID_FILE") {
            webauthn.aaguid_file = Some(aaguid_file);
        }
    }

    fn apply_logging_env_overrides(logging_settings: &mut LoggingSettings) {
        if let Ok(log_level) = std::env::var("RUST_LOG") {
            logging_settings.level = log_level;
        }
    }

    /// Initialize `env_logger` with the configured filter
    ///
    /// # Errors
    ///
    /// Returns an error if a logger is already installed.
    fn init_logging(&self) -> Result<(), log::SetLoggerError> {
        env_logger::Builder::new()
            .parse_filters(&self.logging.level)
            .try_init()
    }

    /// Load environment variables from .env file
    fn load_env_file() {
        if let Ok(contents) = std::fs::read_to_string(".env") {
            for line in contents.lines() {
                let line = line.trim();
                if line.starts_with('#') {
                    continue;
                }
                if let Some((key, value)) = line.split_once('=') {
                    std::env::set_var(key.trim(), value.trim());
                }
            }
        }
    }

    /// Get the bind address for the server
    #[must_use]
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", self.application.host, self.application.port)
    }
}
