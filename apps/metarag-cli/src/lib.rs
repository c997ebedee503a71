//! Wiring shared by the `metarag-*` binaries.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use metarag_core::boundary::CallGuard;
use metarag_core::config::{expand_path, load_vector_stores, Config, Timeouts};
use metarag_core::types::{MetaValue, WhereFilter};
use metarag_logic::{build_engine, ConsistencyChecker, LogicConfig};
use metarag_pipeline::IngestSettings;
use metarag_vector::{RegistryHandle, StoreRegistry};

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

pub struct AppContext {
    pub config: Config,
    pub timeouts: Timeouts,
    pub cancel: CancellationToken,
}

impl AppContext {
    pub fn load() -> anyhow::Result<Self> {
        let config = Config::load().context("loading configuration")?;
        let timeouts = config.timeouts();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling");
                token.cancel();
            }
        });
        Ok(Self { config, timeouts, cancel })
    }

    pub fn vector_guard(&self) -> CallGuard {
        CallGuard::new(self.cancel.clone(), self.timeouts.vector_store())
    }

    pub fn rule_guard(&self) -> CallGuard {
        CallGuard::new(self.cancel.clone(), self.timeouts.rule_engine())
    }

    pub fn data_dir(&self, arg: Option<PathBuf>) -> PathBuf {
        arg.unwrap_or_else(|| expand_path(self.config.get_or("data.raw_txt_dir", "test_data".to_string())))
    }

    pub fn ingest_settings(&self) -> IngestSettings {
        self.config.get_or("ingest", IngestSettings::default())
    }

    pub async fn registry(&self) -> anyhow::Result<RegistryHandle> {
        let path: String = self.config.get("stores.config_path").unwrap_or_else(|_| "vector_stores.json".to_string());
        let configs = load_vector_stores(&expand_path(&path)).with_context(|| format!("reading {path}"))?;
        let registry = StoreRegistry::open_with(&configs, &self.vector_guard(), self.timeouts.embedding()).await;
        if registry.is_empty() {
            anyhow::bail!("no vector collection could be opened from {path}");
        }
        Ok(RegistryHandle::new(registry))
    }

    pub async fn checker(&self) -> anyhow::Result<Arc<ConsistencyChecker>> {
        let logic: LogicConfig = self.config.get_or("logic", LogicConfig::default());
        let engine = build_engine(&logic, self.rule_guard()).await.context("starting rule engine")?;
        Ok(Arc::new(ConsistencyChecker::new(engine)))
    }
}

/// Parse `key=value`; the value is read as int, float or bool before falling back to text.
pub fn parse_filter(pairs: &[String]) -> anyhow::Result<Option<WhereFilter>> {
    if pairs.is_empty() {
        return Ok(None);
    }
    let mut filter = WhereFilter::new();
    for pair in pairs {
        let (key, raw) = pair.split_once('=').with_context(|| format!("expected key=value, got '{pair}'"))?;
        let value = if let Ok(i) = raw.parse::<i64>() {
            MetaValue::Int(i)
        } else if let Ok(f) = raw.parse::<f64>() {
            MetaValue::Float(f)
        } else if let Ok(b) = raw.parse::<bool>() {
            MetaValue::Bool(b)
        } else {
            MetaValue::from(raw)
        };
        filter.insert(key.trim().to_string(), value);
    }
    Ok(Some(filter))
}
