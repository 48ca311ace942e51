// Typed settings for the editor core
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub backend: BackendSettings,
    pub gateway: GatewaySettings,
    pub editor: EditorSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendSettings {
    pub base_url: String,
    pub api_token: String,
    pub company_id: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GatewaySettings {
    /// Seconds a cache entry stays fresh.
    pub cache_ttl_secs: u64,
    /// Minimum spacing between two underlying calls for the same key.
    pub min_call_spacing_ms: u64,
    /// Bounded length of the diagnostic call log.
    pub call_log_capacity: usize,
    /// Literal version substituted for the "latest" sentinel before calling
    /// the execution service, which does not resolve "latest" reliably.
    pub latest_version_fallback: String,
}

impl GatewaySettings {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn min_call_spacing(&self) -> Duration {
        Duration::from_millis(self.min_call_spacing_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EditorSettings {
    pub autosave_delay_ms: u64,
    pub tab_switch_debounce_ms: u64,
}

impl EditorSettings {
    pub fn autosave_delay(&self) -> Duration {
        Duration::from_millis(self.autosave_delay_ms)
    }

    pub fn tab_switch_debounce(&self) -> Duration {
        Duration::from_millis(self.tab_switch_debounce_ms)
    }
}

/// Load settings from defaults, an optional `config/dashgrid` file, and
/// `DASHGRID_`-prefixed environment variables (later sources win).
pub fn load_settings() -> anyhow::Result<Settings> {
    let settings = config::Config::builder()
        .set_default("backend.base_url", "http://localhost:8080")?
        .set_default("backend.api_token", "")?
        .set_default("backend.company_id", "")?
        .set_default("gateway.cache_ttl_secs", 300_u64)?
        .set_default("gateway.min_call_spacing_ms", 500_u64)?
        .set_default("gateway.call_log_capacity", 256_u64)?
        .set_default("gateway.latest_version_fallback", "1.0")?
        .set_default("editor.autosave_delay_ms", 2000_u64)?
        .set_default("editor.tab_switch_debounce_ms", 250_u64)?
        .add_source(config::File::with_name("config/dashgrid").required(false))
        .add_source(config::Environment::with_prefix("DASHGRID").separator("__"))
        .build()?;

    Ok(settings.try_deserialize()?)
}
