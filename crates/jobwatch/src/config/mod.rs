use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use toml::Value;

use crate::error::{Error, Result};
use crate::session::{DEFAULT_INTERVAL_SECS, parse_duration};

pub const DEFAULT_CONFIG_FILE: &str = "jobwatch.toml";
pub const URL_ENV: &str = "JOBWATCH_URL";
pub const DEFAULT_TOKEN_ENV: &str = "JOBWATCH_TOKEN";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub watch: WatchDefaults,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub base_url: Option<String>,
    /// Literal bearer token; wins over `token_env`.
    pub token: Option<String>,
    /// Name of the environment variable holding the bearer token.
    pub token_env: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchDefaults {
    pub interval_secs: Option<u64>,
    /// Duration string such as `30m`; `0` disables the timeout.
    pub timeout: Option<String>,
}

impl ServerConfig {
    pub fn resolve_base_url(&self) -> Result<String> {
        pick_base_url(std::env::var(URL_ENV).ok(), self.base_url.as_deref()).ok_or_else(|| {
            Error::msg(format!(
                "no job server configured: set server.base_url in {DEFAULT_CONFIG_FILE} or {URL_ENV}"
            ))
        })
    }

    pub fn resolve_token(&self) -> Option<String> {
        let env_key = self.token_env.as_deref().unwrap_or(DEFAULT_TOKEN_ENV);
        non_empty(self.token.as_deref()).or_else(|| resolve_env_ref(Some(env_key)))
    }
}

impl WatchDefaults {
    pub fn interval_secs(&self) -> u64 {
        self.interval_secs.unwrap_or(DEFAULT_INTERVAL_SECS)
    }

    pub fn timeout(&self) -> Result<Option<Duration>> {
        let Some(raw) = self.timeout.as_deref() else {
            return Ok(None);
        };
        let d = parse_duration(raw)
            .map_err(|e| Error::msg(format!("invalid watch.timeout '{raw}': {e}")))?;
        Ok((!d.is_zero()).then_some(d))
    }
}

fn pick_base_url(env: Option<String>, configured: Option<&str>) -> Option<String> {
    non_empty(env.as_deref()).or_else(|| non_empty(configured))
}

fn non_empty(v: Option<&str>) -> Option<String> {
    v.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

fn resolve_env_ref(env_key: Option<&str>) -> Option<String> {
    env_key
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|k| std::env::var(k).ok())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn merge_values(base: &mut Value, child: Value) {
    match (base, child) {
        (Value::Table(base_tbl), Value::Table(child_tbl)) => {
            for (k, v) in child_tbl {
                match base_tbl.get_mut(&k) {
                    Some(existing) => merge_values(existing, v),
                    None => {
                        base_tbl.insert(k, v);
                    }
                }
            }
        }
        (base_slot, child_val) => {
            *base_slot = child_val;
        }
    }
}

fn resolve_ref_path(from_file: &Path, reference: &str) -> PathBuf {
    let p = PathBuf::from(reference);
    if p.is_absolute() {
        p
    } else {
        from_file.parent().unwrap_or_else(|| Path::new(".")).join(p)
    }
}

/// Reads a config file, following a root-level `extends = "base.toml"` chain.
fn load_value_inner(path: &Path, stack: &mut HashSet<PathBuf>) -> Result<Value> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !stack.insert(canonical.clone()) {
        return Err(Error::msg(format!(
            "config extends cycle detected at {}",
            canonical.display()
        )));
    }

    let data = fs::read_to_string(path)
        .map_err(|e| Error::msg(format!("failed to read config {}: {e}", path.display())))?;
    let mut value: Value = toml::from_str(&data)
        .map_err(|e| Error::msg(format!("TOML parse error in {}: {e}", path.display())))?;

    let mut out = Value::Table(Default::default());
    if let Some(ext) = value.get("extends").and_then(Value::as_str) {
        let base_path = resolve_ref_path(path, ext);
        out = load_value_inner(&base_path, stack)?;
    }
    if let Some(tbl) = value.as_table_mut() {
        tbl.remove("extends");
    }
    merge_values(&mut out, value);

    stack.remove(&canonical);
    Ok(out)
}

pub fn load(path: &Path) -> Result<WatchConfig> {
    let mut stack = HashSet::<PathBuf>::new();
    let value = load_value_inner(path, &mut stack)?;
    value
        .try_into()
        .map_err(|e| Error::msg(format!("invalid config {}: {e}", path.display())))
}

/// Loads `explicit` when given, else `jobwatch.toml` from the working directory
/// when present, else defaults.
pub fn load_or_default(explicit: Option<&Path>) -> Result<WatchConfig> {
    if let Some(path) = explicit {
        return load(path);
    }
    let local = Path::new(DEFAULT_CONFIG_FILE);
    if local.is_file() {
        tracing::debug!(path = %local.display(), "using config from working directory");
        return load(local);
    }
    Ok(WatchConfig::default())
}
