use serde::{Deserialize, Serialize};
use std::fs;

use crate::utils::crypto::generate_secret;

/// Upper bound on the session cookie lifetime (one year)
pub const MAX_SESSION_DURATION_HOURS: u64 = 24 * 366;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ConfirmrsSettings {
    pub application: ApplicationSettings,
    pub provider: ProviderSettings,
    pub profile: ProfileSettings,
    pub storage: StorageSettings,
    pub session: SessionSettings,
    pub cookies: CookieSettings,
    pub static_files: StaticFilesSettings,
    pub analytics: AnalyticsSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    pub redirect_base_url: String,
    pub cors_origins: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Project URL, e.g. `https://<ref>.supabase.co`
    pub url: String,

    // Direct value (can be overridden by environment variable)
    pub anon_key: Option<String>,

    // Environment variable name for override
    pub anon_key_env: Option<String>,

    /// Upper bound for every provider call, in seconds
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileSettings {
    /// Write a profile row after each confirmation
    pub enabled: bool,
    pub table: String,
    pub conflict_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory holding the confirmation record
    pub record_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub session_secret: String,
    pub session_duration_hours: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieSettings {
    pub secure: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticFilesSettings {
    pub assets_folder: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsSettings {
    /// Emit analytics events to the application log
    pub log_events: bool,
    /// Optional collector that receives each event as JSON
    pub webhook_url: Option<String>,
    pub webhook_timeout_secs: u64,
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
            redirect_base_url: "http://localhost:8080".to_string(),
            cors_origins: "http://localhost:3000,http://localhost:8080".to_string(),
        }
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: None,
            anon_key_env: Some("SUPABASE_ANON_KEY".to_string()),
            request_timeout_secs: 10,
        }
    }
}

impl Default for ProfileSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            table: "profiles".to_string(),
            conflict_key: "id".to_string(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            record_dir: "data".to_string(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            session_secret: String::new(), // Will be generated if empty
            session_duration_hours: 24,
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

impl Default for StaticFilesSettings {
    fn default() -> Self {
        Self {
            assets_folder: "src/static".to_string(),
        }
    }
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            log_events: true,
            webhook_url: None,
            webhook_timeout_secs: 5,
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

impl LoggingSettings {
    /// Filter directives for the logger, `info` when the level is blank
    #[must_use]
    pub fn filter(&self) -> &str {
        match self.level.trim() {
            "" => "info",
            level => level,
        }
    }
}

impl ConfirmrsSettings {
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

        Self::initialize_logger(&settings.logging)?;
        Ok(settings)
    }

    /// Initialize the logger from the resolved `[logging]` section
    ///
    /// `RUST_LOG` has already been folded into `level` by the env overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a logger is already installed
    fn initialize_logger(logging: &LoggingSettings) -> Result<(), Box<dyn std::error::Error>> {
        env_logger::Builder::new()
            .parse_filters(logging.filter())
            .try_init()?;
        Ok(())
    }

    /// Load base settings from TOML file(s) or use defaults
    /// Settings are loaded with the following priority (highest to lowest):
    /// 1. Environment variables (applied separately after loading base settings)
    /// 2. Settings.toml in `CONFIRMRS_SECRETS_DIR` (if specified and exists)
    /// 3. Settings.toml in current directory (if exists)
    /// 4. Default settings
    ///
    /// # Errors
    ///
    /// Returns an error if a settings file cannot be read or parsed
    fn load_base_settings() -> Result<Self, Box<dyn std::error::Error>> {
        let mut settings = Self::default();

        let default_config_path = std::path::PathBuf::from("Settings.toml");
        if default_config_path.exists() {
            let toml_content = fs::read_to_string(&default_config_path)?;
            settings = Self::from_toml(&toml_content)?;
            println!(
                "✓ Loaded base settings from {}",
                default_config_path.display()
            );
        }

        if let Ok(secrets_dir) = std::env::var("CONFIRMRS_SECRETS_DIR") {
            let secrets_path = std::path::Path::new(&secrets_dir).join("Settings.toml");
            if secrets_path.exists() {
                let secrets_toml_content = fs::read_to_string(&secrets_path)?;
                settings = Self::from_toml(&secrets_toml_content)?;
                println!("✓ Overriding settings from {}", secrets_path.display());
            } else {
                println!(
                    "ℹ CONFIRMRS_SECRETS_DIR set but no Settings.toml found at: {}",
                    secrets_path.display()
                );
            }
        }

        Ok(settings)
    }

    /// Parse settings from TOML; missing sections and fields take their defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed
    pub fn from_toml(content: &str) -> Result<Self, basic_toml::Error> {
        basic_toml::from_str(content)
    }

    /// Apply environment variable overrides to settings
    pub fn apply_env_overrides(settings: &mut Self) {
        Self::apply_application_env_overrides(&mut settings.application);
        Self::apply_provider_env_overrides(&mut settings.provider);
        Self::apply_profile_env_overrides(&mut settings.profile);
        Self::apply_storage_env_overrides(&mut settings.storage);
        Self::apply_session_env_overrides(&mut settings.session);
        Self::apply_cookie_env_overrides(&mut settings.cookies);
        Self::apply_static_files_env_overrides(&mut settings.static_files);
        Self::apply_analytics_env_overrides(&mut settings.analytics);
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
        if let Ok(redirect_base_url) = std::env::var("REDIRECT_BASE_URL") {
            app_settings.redirect_base_url = redirect_base_url;
        }
        if let Ok(cors_origins) = std::env::var("CORS_ORIGINS") {
            app_settings.cors_origins = cors_origins;
        }
    }

    pub fn apply_provider_env_overrides(provider_settings: &mut ProviderSettings) {
        if let Ok(url) = std::env::var("SUPABASE_URL") {
            provider_settings.url = url;
        }
        Self::apply_numeric_env_override(
            "PROVIDER_TIMEOUT_SECS",
            &mut provider_settings.request_timeout_secs,
        );
    }

    fn apply_profile_env_overrides(profile_settings: &mut ProfileSettings) {
        if let Ok(table) = std::env::var("PROFILE_TABLE") {
            if table.is_empty() {
                profile_settings.enabled = false;
            } else {
                profile_settings.table = table;
            }
        }
    }

    fn apply_storage_env_overrides(storage_settings: &mut StorageSettings) {
        if let Ok(record_dir) = std::env::var("RECORD_DIR") {
            storage_settings.record_dir = record_dir;
        }
    }

    /// Apply environment overrides for session settings
    pub fn apply_session_env_overrides(session_settings: &mut SessionSettings) {
        Self::apply_numeric_env_override(
            "SESSION_DURATION_HOURS",
            &mut session_settings.session_duration_hours,
        );
        if session_settings.session_duration_hours > MAX_SESSION_DURATION_HOURS {
            println!(
                "⚠ SESSION_DURATION_HOURS={} exceeds the maximum, using {MAX_SESSION_DURATION_HOURS}",
                session_settings.session_duration_hours
            );
            session_settings.session_duration_hours = MAX_SESSION_DURATION_HOURS;
        }

        Self::handle_session_secret_override(session_settings);
    }

    /// Helper function to apply numeric environment variable overrides
    fn apply_numeric_env_override(env_var: &str, target: &mut u64) {
        if let Ok(value_str) = std::env::var(env_var) {
            if let Ok(value) = value_str.parse::<u64>() {
                *target = value;
            }
        }
    }

    /// Helper function to handle session secret environment override and generation
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
            session_settings.session_secret = generate_secret();
            Self::warn_about_generated_secret();
        }
    }

    fn warn_about_generated_secret() {
        eprintln!("⚠️  WARNING: Using auto-generated session secret");
        eprintln!("🔒 For production use, set the SESSION_SECRET environment variable");
        eprintln!("   or configure session_secret in Settings.toml");
        eprintln!("💡 Session cookies will not survive a restart unless a secret is configured");
    }

    fn apply_cookie_env_overrides(cookie_settings: &mut CookieSettings) {
        if let Ok(cookie_secure_str) = std::env::var("COOKIE_SECURE") {
            if let Ok(cookie_secure) = cookie_secure_str.parse::<bool>() {
                cookie_settings.secure = cookie_secure;
            }
        }
    }

    fn apply_static_files_env_overrides(static_settings: &mut StaticFilesSettings) {
        if let Ok(assets_folder) = std::env::var("STATIC_FOLDER_PATH") {
            static_settings.assets_folder = assets_folder;
        }
    }

    fn apply_analytics_env_overrides(analytics_settings: &mut AnalyticsSettings) {
        if let Ok(webhook_url) = std::env::var("ANALYTICS_WEBHOOK_URL") {
            analytics_settings.webhook_url = Some(webhook_url).filter(|url| !url.is_empty());
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

    /// URL the confirmation email should link back to
    #[must_use]
    pub fn get_confirm_url(&self) -> String {
        format!(
            "{}/auth/confirm",
            self.application.redirect_base_url.trim_end_matches('/')
        )
    }
}

impl ProviderSettings {
    /// Get the anon key, checking the environment variable first, then the direct value
    #[must_use]
    pub fn get_anon_key(&self) -> Option<String> {
        if let Some(env_var) = &self.anon_key_env {
            if let Ok(value) = std::env::var(env_var) {
                if !value.is_empty() {
                    return Some(value);
                }
            }
        }
        self.anon_key.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    // Helper function to clean all relevant environment variables for tests
    fn clean_env_vars() {
        std::env::remove_var("SESSION_SECRET");
        std::env::remove_var("SESSION_DURATION_HOURS");
        std::env::remove_var("SUPABASE_URL");
        std::env::remove_var("SUPABASE_ANON_KEY");
        std::env::remove_var("PROVIDER_TIMEOUT_SECS");
        std::env::remove_var("CONFIRMRS_TEST_ANON_KEY");
        std::env::remove_var("RUST_LOG");
    }

    #[test]
    fn test_defaults() {
        let settings = ConfirmrsSettings::default();
        assert_eq!(settings.session.session_secret, "");
        assert_eq!(settings.session.session_duration_hours, 24);
        assert_eq!(settings.provider.request_timeout_secs, 10);
        assert!(settings.profile.enabled);
        assert_eq!(settings.profile.table, "profiles");
        assert_eq!(settings.get_bind_address(), "0.0.0.0:8080");
        assert_eq!(settings.get_confirm_url(), "http://localhost:8080/auth/confirm");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings = ConfirmrsSettings::from_toml(
            r#"
            [provider]
            url = "https://project.supabase.co"
            anon_key = "anon"

            [profile]
            table = "user_profiles"
            "#,
        )
        .unwrap();

        assert_eq!(settings.provider.url, "https://project.supabase.co");
        assert_eq!(settings.provider.request_timeout_secs, 10);
        assert_eq!(settings.profile.table, "user_profiles");
        assert_eq!(settings.profile.conflict_key, "id");
        assert_eq!(settings.application.port, 8080);
    }

    #[test]
    fn test_cors_origins() {
        let mut settings = ConfirmrsSettings::default();
        settings.application.cors_origins = "https://a.example.com, https://b.example.com,".to_string();
        assert_eq!(
            settings.get_cors_origins(),
            vec!["https://a.example.com", "https://b.example.com"]
        );
    }

    #[test]
    #[serial]
    fn test_session_secret_env_override() {
        clean_env_vars();

        let mut session_settings = SessionSettings {
            session_secret: "default-secret".to_string(),
            session_duration_hours: 24,
        };

        std::env::set_var("SESSION_SECRET", "env-override-secret");
        std::env::set_var("SESSION_DURATION_HOURS", "48");
        ConfirmrsSettings::apply_session_env_overrides(&mut session_settings);

        assert_eq!(session_settings.session_secret, "env-override-secret");
        assert_eq!(session_settings.session_duration_hours, 48);

        clean_env_vars();
    }

    #[test]
    #[serial]
    fn test_session_secret_auto_generation() {
        clean_env_vars();

        let mut first = SessionSettings::default();
        let mut second = SessionSettings::default();
        ConfirmrsSettings::apply_session_env_overrides(&mut first);
        ConfirmrsSettings::apply_session_env_overrides(&mut second);

        assert!(first.session_secret.len() > 40);
        assert_ne!(first.session_secret, second.session_secret);

        clean_env_vars();
    }

    #[test]
    #[serial]
    fn test_provider_env_overrides() {
        clean_env_vars();

        let mut provider = ProviderSettings::default();
        std::env::set_var("SUPABASE_URL", "https://env.supabase.co");
        std::env::set_var("PROVIDER_TIMEOUT_SECS", "3");
        std::env::set_var("SUPABASE_ANON_KEY", "env-anon");

        ConfirmrsSettings::apply_provider_env_overrides(&mut provider);

        assert_eq!(provider.url, "https://env.supabase.co");
        assert_eq!(provider.request_timeout_secs, 3);
        assert_eq!(provider.get_anon_key().as_deref(), Some("env-anon"));

        clean_env_vars();
    }

    #[test]
    #[serial]
    fn test_anon_key_falls_back_to_direct_value() {
        clean_env_vars();

        let provider = ProviderSettings {
            anon_key: Some("direct".to_string()),
            anon_key_env: Some("CONFIRMRS_TEST_ANON_KEY".to_string()),
            ..ProviderSettings::default()
        };
        assert_eq!(provider.get_anon_key().as_deref(), Some("direct"));

        std::env::set_var("CONFIRMRS_TEST_ANON_KEY", "from-env");
        assert_eq!(provider.get_anon_key().as_deref(), Some("from-env"));

        clean_env_vars();
    }

    #[test]
    #[serial]
    fn test_logging_level_from_toml_and_env() {
        clean_env_vars();

        let mut settings = ConfirmrsSettings::from_toml(
            r#"
            [logging]
            level = "debug,actix_web=warn"
            "#,
        )
        .unwrap();
        ConfirmrsSettings::apply_env_overrides(&mut settings);
        assert_eq!(settings.logging.filter(), "debug,actix_web=warn");

        std::env::set_var("RUST_LOG", "trace");
        ConfirmrsSettings::apply_env_overrides(&mut settings);
        assert_eq!(settings.logging.filter(), "trace");

        settings.logging.level = "  ".to_string();
        assert_eq!(settings.logging.filter(), "info");

        clean_env_vars();
    }

    #[test]
    #[serial]
    fn test_session_duration_env_override_is_clamped() {
        clean_env_vars();

        let mut session_settings = SessionSettings::default();
        std::env::set_var("SESSION_DURATION_HOURS", u64::MAX.to_string());
        ConfirmrsSettings::apply_session_env_overrides(&mut session_settings);
        assert_eq!(
            session_settings.session_duration_hours,
            MAX_SESSION_DURATION_HOURS
        );

        clean_env_vars();
    }
}
