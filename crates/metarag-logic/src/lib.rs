//! Fact-based consistency checking for metadata aggregates.
//!
//! Aggregates are turned into ground facts (`facts`), handed to a
//! [`RuleEngine`] and queried for integrity violations by the
//! [`ConsistencyChecker`]. Two engines are provided: the in-process
//! [`EmbeddedEngine`] and [`SwiplEngine`], which drives an external SWI-Prolog.

pub mod checker;
pub mod engine;
pub mod facts;
pub mod swipl;
pub mod term;

use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;

use metarag_core::boundary::CallGuard;
use metarag_core::config::expand_path;
use metarag_core::error::Result;

pub use checker::ConsistencyChecker;
pub use engine::{EmbeddedEngine, RuleEngine};
pub use facts::metadata_to_facts;
pub use swipl::SwiplEngine;
pub use term::{Bindings, Fact, Goal, GoalArg, Term};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    #[default]
    Embedded,
    Swipl,
}

/// `[logic]` configuration section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogicConfig {
    pub engine: EngineKind,
    pub kb_file: String,
    pub swipl_path: Option<String>,
}

impl Default for LogicConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::Embedded,
            kb_file: "crates/metarag-logic/kb/metadata_rules.pl".to_string(),
            swipl_path: None,
        }
    }
}

impl LogicConfig {
    pub fn kb_path(&self) -> PathBuf {
        expand_path(&self.kb_file)
    }
}

pub async fn build_engine(cfg: &LogicConfig, guard: CallGuard) -> Result<Arc<dyn RuleEngine>> {
    match cfg.engine {
        EngineKind::Embedded => Ok(Arc::new(EmbeddedEngine::new())),
        EngineKind::Swipl => {
            let bin = SwiplEngine::resolve_binary(cfg.swipl_path.as_deref());
            Ok(Arc::new(SwiplEngine::spawn(&bin, &cfg.kb_path(), guard).await?))
        }
    }
}
