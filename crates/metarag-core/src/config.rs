//! Configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! for application settings, and parses the JSON `VectorStores` section that
//! declares one entry per vector collection.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_from(Path::new("."), &env_name)
    }

    /// Merge `config.toml`, `config.<env>.toml` from `dir`, then `APP_*` variables.
    pub fn load_from(dir: &Path, env_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::new().merge(Toml::file(dir.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate_for_env(env_name)?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn get_or<T>(&self, key: &str, default: T) -> T
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment.extract_inner(key).unwrap_or(default)
    }

    /// Caller-supplied deadlines for the blocking boundaries.
    pub fn timeouts(&self) -> Timeouts {
        self.get("timeouts").unwrap_or_default()
    }

    fn validate_for_env(&self, env: &str) -> anyhow::Result<()> {
        let timeouts = self.timeouts();
        if timeouts.vector_store_ms == 0 || timeouts.rule_engine_ms == 0 || timeouts.embedding_ms == 0 {
            anyhow::bail!("[{env}] timeouts must be positive");
        }
        if matches!(env, "prod" | "production") && self.figment.find_value("stores.config_path").is_err() {
            anyhow::bail!("[{env}] stores.config_path is required");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub vector_store_ms: u64,
    pub rule_engine_ms: u64,
    pub embedding_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { vector_store_ms: 30_000, rule_engine_ms: 10_000, embedding_ms: 60_000 }
    }
}

impl Timeouts {
    pub fn vector_store(&self) -> Duration { Duration::from_millis(self.vector_store_ms) }
    pub fn rule_engine(&self) -> Duration { Duration::from_millis(self.rule_engine_ms) }
    pub fn embedding(&self) -> Duration { Duration::from_millis(self.embedding_ms) }
}

/// One entry of the `VectorStores` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VectorStoreConfig {
    pub collection_name: String,
    pub persist_directory: PathBuf,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

pub const DEFAULT_EMBEDDING_MODEL: &str = "hash:xxh64:d384";

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoresDocument {
    Object(serde_json::Map<String, serde_json::Value>),
    List(Vec<serde_json::Value>),
}

/// Parse the `VectorStores` section out of a JSON document.
///
/// The section may sit at the top level of an object or inside any element of
/// a top-level array. Relative `persist_directory` values are resolved
/// against `base`.
pub fn parse_vector_stores(json: &str, base: &Path) -> Result<Vec<VectorStoreConfig>> {
    let doc: StoresDocument =
        serde_json::from_str(json).map_err(|e| Error::config(format!("malformed store config: {e}")))?;
    let section = match doc {
        StoresDocument::Object(map) => map.get("VectorStores").cloned(),
        StoresDocument::List(items) => items
            .into_iter()
            .find_map(|item| item.get("VectorStores").cloned()),
    }
    .ok_or_else(|| Error::config("missing 'VectorStores' section"))?;

    if !section.is_array() {
        return Err(Error::config("'VectorStores' must be a list"));
    }
    let mut stores: Vec<VectorStoreConfig> = serde_json::from_value(section)
        .map_err(|e| Error::config(format!("invalid VectorStores entry: {e}")))?;
    for store in &mut stores {
        if store.collection_name.trim().is_empty() {
            return Err(Error::config("VectorStores entry with empty 'collection_name'"));
        }
        store.persist_directory = resolve_with_base(base, store.persist_directory.to_string_lossy());
    }
    Ok(stores)
}

pub fn load_vector_stores(path: &Path) -> Result<Vec<VectorStoreConfig>> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| Error::config(format!("cannot read {}: {e}", path.display())))?;
    let base = path.parent().unwrap_or(Path::new("."));
    parse_vector_stores(&json, base)
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
