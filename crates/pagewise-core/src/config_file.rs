use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub worker: Option<WorkerConfig>,
    pub fetch: Option<FetchConfig>,
    pub nav: Option<NavConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub binary_path: Option<String>,
    pub work_dir: Option<String>,
    pub request_timeout_ms: Option<u64>,
    pub startup_timeout_secs: Option<u64>,
    pub shutdown_grace_secs: Option<u64>,
    pub forward_output: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchConfig {
    pub timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
    pub cache_ttl_secs: Option<u64>,
}

/// Overrides for the navigation scoring weights.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NavConfig {
    pub rel_bonus: Option<i64>,
    pub landmark_bonus: Option<i64>,
    pub nav_class_bonus: Option<i64>,
    pub text_match_scale: Option<i64>,
    pub attribute_match_scale: Option<i64>,
    pub sidebar_penalty: Option<i64>,
    pub large_list_penalty: Option<i64>,
    pub large_list_threshold: Option<usize>,
}

/// Platform config directory path: `<config_dir>/pagewise/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("pagewise").join("config.toml"))
}

/// Load config by cascading CWD `.pagewise.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".pagewise.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparseable config file");
            None
        }
    }
}

/// Pick the overlay value, falling back to the base.
fn pick<S, T>(base: &Option<S>, overlay: &Option<S>, field: impl Fn(&S) -> Option<T>) -> Option<T> {
    overlay
        .as_ref()
        .and_then(&field)
        .or_else(|| base.as_ref().and_then(&field))
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    let (bw, ow) = (&base.worker, &overlay.worker);
    let (bf, of) = (&base.fetch, &overlay.fetch);
    let (bn, on) = (&base.nav, &overlay.nav);

    ConfigFile {
        worker: Some(WorkerConfig {
            binary_path: pick(bw, ow, |w| w.binary_path.clone()),
            work_dir: pick(bw, ow, |w| w.work_dir.clone()),
            request_timeout_ms: pick(bw, ow, |w| w.request_timeout_ms),
            startup_timeout_secs: pick(bw, ow, |w| w.startup_timeout_secs),
            shutdown_grace_secs: pick(bw, ow, |w| w.shutdown_grace_secs),
            forward_output: pick(bw, ow, |w| w.forward_output),
        }),
        fetch: Some(FetchConfig {
            timeout_secs: pick(bf, of, |f| f.timeout_secs),
            user_agent: pick(bf, of, |f| f.user_agent.clone()),
            cache_ttl_secs: pick(bf, of, |f| f.cache_ttl_secs),
        }),
        nav: Some(NavConfig {
            rel_bonus: pick(bn, on, |n| n.rel_bonus),
            landmark_bonus: pick(bn, on, |n| n.landmark_bonus),
            nav_class_bonus: pick(bn, on, |n| n.nav_class_bonus),
            text_match_scale: pick(bn, on, |n| n.text_match_scale),
            attribute_match_scale: pick(bn, on, |n| n.attribute_match_scale),
            sidebar_penalty: pick(bn, on, |n| n.sidebar_penalty),
            large_list_penalty: pick(bn, on, |n| n.large_list_penalty),
            large_list_threshold: pick(bn, on, |n| n.large_list_threshold),
        }),
    }
}

/// Render a config as pretty TOML.
pub fn to_toml_string(config: &ConfigFile) -> Result<String, String> {
    toml::to_string_pretty(config).map_err(|e| format!("Failed to serialize config: {}", e))
}

/// Save the current config to the platform config directory.
pub fn save_config(config: &ConfigFile) -> Result<PathBuf, String> {
    let path = config_path().ok_or_else(|| "Could not determine config directory".to_string())?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let content = to_toml_string(config)?;
    std::fs::write(&path, content).map_err(|e| format!("Failed to write config: {}", e))?;
    Ok(path)
}
