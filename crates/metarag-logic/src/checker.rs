use std::collections::HashSet;
use std::sync::Arc;

use metarag_core::error::Result;
use metarag_core::metadata::Metadata;

use crate::engine::RuleEngine;
use crate::facts::metadata_to_facts;
use crate::term::Goal;

/// Submits metadata aggregates to a rule engine and asks it for integrity violations.
pub struct ConsistencyChecker {
    engine: Arc<dyn RuleEngine>,
}

impl ConsistencyChecker {
    pub fn new(engine: Arc<dyn RuleEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<dyn RuleEngine> {
        &self.engine
    }

    /// Assert every fact of `meta`. Returns the number of facts sent.
    pub async fn submit(&self, meta: &Metadata) -> Result<usize> {
        let facts = metadata_to_facts(meta);
        self.engine.assert_facts(&facts).await?;
        tracing::debug!(metadata = %meta.id, facts = facts.len(), "metadata submitted");
        Ok(facts.len())
    }

    /// Contents ids claimed by more than one metadata root, each once, in first-seen order.
    pub async fn check_composition_consistency(&self) -> Result<Vec<String>> {
        let goal = Goal::inconsistent_composition();
        let solutions = self.engine.query(&goal).await?;
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for row in solutions {
            let Some(id) = row.get("X").and_then(|t| t.text()).map(str::to_string) else {
                continue;
            };
            if seen.insert(id.clone()) {
                out.push(id);
            }
        }
        if !out.is_empty() {
            tracing::warn!(count = out.len(), "inconsistent composition detected");
        }
        Ok(out)
    }
}
