use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;

use crate::session::cookie::MAX_RECOVERY_SESSION_MINUTES;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NedilSettings {
    pub application: ApplicationSettings,
    pub identity: IdentitySettings,
    pub reconciler: ReconcilerSettings,
    pub session: SessionSettings,
    pub cookies: CookieSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: String,
    /// Brand name shown on rendered pages
    pub site_name: String,
}

/// Hosted identity service (Supabase) connection settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentitySettings {
    pub url: String,
    pub anon_key: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerSettings {
    /// Pause after a successful one-time-code verification before corroborating
    pub otp_settle_delay_ms: u64,
    /// Pause after establishing a signup session before corroborating
    pub session_settle_delay_ms: u64,
    pub min_password_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub session_secret: String,
    /// Lifetime of the encrypted cookie that carries a recovery session to the password form
    pub recovery_session_minutes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieSettings {
    pub secure: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: "http://localhost:3000,http://localhost:8080".to_string(),
            site_name: "NedilAI".to_string(),
        }
    }
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            request_timeout_secs: 10,
        }
    }
}

impl std::fmt::Debug for IdentitySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentitySettings")
            .field("url", &self.url)
            .field(
                "anon_key",
                &if self.anon_key.is_empty() { "<unset>" } else { "<set>" },
            )
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl IdentitySettings {
    /// Both the service URL and the public API key are present
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty() && !self.anon_key.trim().is_empty()
    }
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            otp_settle_delay_ms: 500,
            session_settle_delay_ms: 1000,
            min_password_length: 6,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            session_secret: String::new(), // Will be generated if empty
            recovery_session_minutes: 15,
        }
    }
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            secure: true, // Default to secure cookies
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

impl NedilSettings {
    /// Load settings from configuration files and environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Logger initialization fails
    /// - Settings file cannot be read or parsed
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        Self::load_env_file();

        let mut settings = Self::load_base_settings()?;
        Self::apply_env_overrides(&mut settings);

        env_logger::Builder::new()
            .parse_filters(&settings.logging.level)
            .try_init()?;

        Ok(settings)
    }

    /// Load base settings from TOML file(s) or use defaults
    /// Settings are loaded with the following priority (highest to lowest):
    /// 1. Environment variables (applied separately after loading base settings)
    /// 2. Settings.toml in `NEDILAI_SECRETS_DIR` (if specified and exists),
    ///    merged key by key over the base file
    /// 3. Settings.toml in current directory (if exists)
    /// 4. Default settings
    ///
    /// # Errors
    ///
    /// Returns an error if a settings file cannot be read or parsed
    fn load_base_settings() -> Result<Self, Box<dyn std::error::Error>> {
        let mut layers = Vec::new();

        let default_config_path = std::path::PathBuf::from("Settings.toml");
        if default_config_path.exists() {
            println!(
                "✓ Loaded base settings from {}",
                default_config_path.display()
            );
            layers.push(default_config_path);
        }

        if let Ok(secrets_dir) = std::env::var("NEDILAI_SECRETS_DIR") {
            let secrets_path = std::path::Path::new(&secrets_dir).join("Settings.toml");
            if secrets_path.exists() {
                println!("✓ Overriding settings from {}", secrets_path.display());
                layers.push(secrets_path);
            } else {
                println!(
                    "ℹ NEDILAI_SECRETS_DIR set but no Settings.toml found at: {}",
                    secrets_path.display()
                );
            }
        }

        Self::from_toml_files(&layers)
    }

    /// Parse TOML settings files, each layered key by key over the previous
    ///
    /// Keys missing from every file fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read or the merged result is not
    /// valid settings TOML
    pub fn from_toml_files<P: AsRef<std::path::Path>>(
        paths: &[P],
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let mut merged = Value::Object(Map::new());
        for path in paths {
            let toml_content = fs::read_to_string(path)?;
            let layer: Value = basic_toml::from_str(&toml_content)?;
            merge_layer(&mut merged, layer);
        }
        Ok(serde_json::from_value(merged)?)
    }

    /// Apply environment variable overrides to settings
    pub fn apply_env_overrides(settings: &mut Self) {
        Self::apply_application_env_overrides(&mut settings.application);
        Self::apply_identity_env_overrides(&mut settings.identity);
        Self::apply_reconciler_env_overrides(&mut settings.reconciler);
        Self::apply_session_env_overrides(&mut settings.session);
        Self::apply_cookie_env_overrides(&mut settings.cookies);
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
        if let Ok(cors_origins) = std::env::var("CORS_ORIGINS") {
            app_settings.cors_origins = cors_origins;
        }
    }

    /// Apply environment overrides for the identity service
    ///
    /// The `NEXT_PUBLIC_` names are accepted so the service can share an
    /// environment file with the web frontend.
    pub fn apply_identity_env_overrides(identity_settings: &mut IdentitySettings) {
        if let Some(url) = Self::first_non_empty_env(&["SUPABASE_URL", "NEXT_PUBLIC_SUPABASE_URL"]) {
            identity_settings.url = url;
        }
        if let Some(key) =
            Self::first_non_empty_env(&["SUPABASE_ANON_KEY", "NEXT_PUBLIC_SUPABASE_ANON_KEY"])
        {
            identity_settings.anon_key = key;
        }
        Self::apply_numeric_env_override(
            "IDENTITY_TIMEOUT_SECS",
            &mut identity_settings.request_timeout_secs,
        );
    }

    fn apply_reconciler_env_overrides(reconciler_settings: &mut ReconcilerSettings) {
        Self::apply_numeric_env_override(
            "OTP_SETTLE_DELAY_MS",
            &mut reconciler_settings.otp_settle_delay_ms,
        );
        Self::apply_numeric_env_override(
            "SESSION_SETTLE_DELAY_MS",
            &mut reconciler_settings.session_settle_delay_ms,
        );
        if let Ok(value_str) = std::env::var("MIN_PASSWORD_LENGTH") {
            if let Ok(value) = value_str.parse::<usize>() {
                reconciler_settings.min_password_length = value;
            }
        }
    }

    /// Apply environment overrides for session settings
    pub fn apply_session_env_overrides(session_settings: &mut SessionSettings) {
        Self::apply_numeric_env_override(
            "RECOVERY_SESSION_MINUTES",
            &mut session_settings.recovery_session_minutes,
        );
        if session_settings.recovery_session_minutes > MAX_RECOVERY_SESSION_MINUTES {
            eprintln!(
                "⚠️  WARNING: recovery_session_minutes {} capped to {MAX_RECOVERY_SESSION_MINUTES}",
                session_settings.recovery_session_minutes
            );
            session_settings.recovery_session_minutes = MAX_RECOVERY_SESSION_MINUTES;
        }
        Self::handle_session_secret_override(session_settings);
    }

    fn apply_numeric_env_override(env_var: &str, target: &mut u64) {
        if let Ok(value_str) = std::env::var(env_var) {
            if let Ok(value) = value_str.parse::<u64>() {
                *target = value;
            }
        }
    }

    fn first_non_empty_env(names: &[&str]) -> Option<String> {
        names
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|value| !value.trim().is_empty())
    }

    fn handle_session_secret_override(session_settings: &mut SessionSettings) {
        let env_secret_set = std::env::var("SESSION_SECRET").is_ok_and(|secret| {
            if secret.is_empty() {
                false
            } else {
                session_settings.session_secret = secret;
                true
            }
        });

        if !env_secret_set && session_settings.session_secret.is_empty() {
            session_settings.session_secret = Self::generate_random_session_secret();
            Self::warn_about_generated_secret();
        }
    }

    /// Generate 32 bytes (256 bits) of entropy for AES-256 compatibility
    fn generate_random_session_secret() -> String {
        use rand::RngCore;
        let mut secret = [0u8; 32];
        rand::rng().fill_bytes(&mut secret);
        general_purpose::STANDARD.encode(secret)
    }

    fn warn_about_generated_secret() {
        eprintln!("⚠️  WARNING: Using auto-generated session secret");
        eprintln!("🔒 For production use, set the SESSION_SECRET environment variable");
        eprintln!("   or configure session_secret in Settings.toml");
        eprintln!("💡 Password reset links opened before a restart will need to be requested again");
    }

    fn apply_cookie_env_overrides(cookie_settings: &mut CookieSettings) {
        if let Ok(cookie_secure_str) = std::env::var("COOKIE_SECURE") {
            if let Ok(cookie_secure) = cookie_secure_str.parse::<bool>() {
                cookie_settings.secure = cookie_secure;
            }
        }
    }

    fn apply_logging_env_overrides(logging_settings: &mut LoggingSettings) {
        if let Ok(log_level) = std::env::var("RUST_LOG") {
            logging_settings.level = log_level;
        }
    }

    /// Load environment variables from .env file
    fn load_env_file() {
        if let Ok(contents) = std::fs::read_to_string(".env") {
            for line in contents.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                if let Some((key, value)) = line.split_once('=') {
                    std::env::set_var(key.trim(), value.trim().trim_matches('"'));
                }
            }
        }
    }

    /// Get the bind address for the server
    #[must_use]
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", self.application.host, self.application.port)
    }

    /// Get CORS origins as a vector of strings
    #[must_use]
    pub fn get_cors_origins(&self) -> Vec<String> {
        self.application
            .cors_origins
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Overlay `layer` onto `base`; tables merge recursively, other values replace
fn merge_layer(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(base), Value::Object(layer)) => {
            for (key, value) in layer {
                match base.get_mut(&key) {
                    Some(existing) => merge_layer(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, layer) => *base = layer,
    }
}
