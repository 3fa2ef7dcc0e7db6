use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::gateway::{FileStore, RecordGateway, Unconfigured};
use crate::scheduler::ReminderRegistry;
use crate::services::{FileService, RecordService};
use crate::supabase::{SupabaseClient, SupabaseStorage};
use crate::types::Config;

/// Environment variables that override config.json.
const ENV_SUPABASE_URL: &str = "SUPABASE_URL";
const ENV_SUPABASE_KEYS: [&str; 2] = ["SUPABASE_SERVICE_ROLE_KEY", "SUPABASE_ANON_KEY"];
const ENV_HTTP_BIND: &str = "SMLEDGER_HTTP_BIND";

/// Application state shared by every request handler
pub struct AppState {
    pub config: Config,
    pub records: RecordService,
    pub files: FileService,
    pub reminders: ReminderRegistry,
}

impl AppState {
    /// Build state against the configured Supabase project.
    ///
    /// Missing credentials do not stop the server: backend calls then fail
    /// with a message saying what to configure.
    pub fn new(config: Config) -> Result<Self, String> {
        let records: Arc<dyn RecordGateway> = match SupabaseClient::new(&config.supabase) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                log::warn!("{}. Record features disabled.", e);
                Arc::new(Unconfigured::new(e.to_string()))
            }
        };
        let files: Arc<dyn FileStore> = match SupabaseStorage::new(&config.supabase) {
            Ok(storage) => Arc::new(storage),
            Err(e) => {
                log::warn!("{}. File features disabled.", e);
                Arc::new(Unconfigured::new(e.to_string()))
            }
        };
        Self::with_gateways(config, records, files, &get_state_dir()?)
    }

    pub fn with_gateways(
        config: Config,
        records: Arc<dyn RecordGateway>,
        files: Arc<dyn FileStore>,
        state_dir: &Path,
    ) -> Result<Self, String> {
        let snapshot = config
            .fallback_to_cache
            .then(|| state_dir.join("records.json"));
        let reminders =
            ReminderRegistry::load(state_dir.join("reminders.json"), &config.timezone)?;

        Ok(Self {
            records: RecordService::new(records, config.fallback_to_cache, snapshot),
            files: FileService::new(files),
            reminders,
            config,
        })
    }
}

/// Get the canonical config file path (~/.smledger/config.json)
pub fn config_path() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or("Could not find home directory")?;
    Ok(home.join(".smledger").join("config.json"))
}

/// Get the state directory (~/.smledger)
fn get_state_dir() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or("Could not find home directory")?;
    let state_dir = home.join(".smledger");

    if !state_dir.exists() {
        fs::create_dir_all(&state_dir).map_err(|e| format!("Failed to create state dir: {}", e))?;
    }

    Ok(state_dir)
}

/// Load configuration from ~/.smledger/config.json, then apply the
/// environment overrides. A missing file means defaults.
pub fn load_config() -> Result<Config, String> {
    let mut config = read_config_file(&config_path()?)?;
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<Config, String> {
    if !path.exists() {
        log::info!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let content =
        fs::read_to_string(path).map_err(|e| format!("Failed to read config: {}", e))?;

    serde_json::from_str(&content).map_err(|e| format!("Failed to parse config: {}", e))
}

fn apply_env_overrides(config: &mut Config, env: impl Fn(&str) -> Option<String>) {
    let set = |name: &str| env(name).filter(|v| !v.trim().is_empty());

    if let Some(url) = set(ENV_SUPABASE_URL) {
        config.supabase.url = Some(url);
    }
    if let Some(key) = ENV_SUPABASE_KEYS.iter().find_map(|&name| set(name)) {
        config.supabase.key = Some(key);
    }
    if let Some(bind) = set(ENV_HTTP_BIND) {
        config.http_bind = bind;
    }
}
