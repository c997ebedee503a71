use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::RwLock;

use metarag_core::error::{Error, Result};

use crate::term::{Bindings, Fact, Goal, GoalArg, Term};

/// Narrow interface to a fact base with rules.
#[async_trait]
pub trait RuleEngine: Send + Sync {
    async fn assert_facts(&self, facts: &[Fact]) -> Result<()>;

    /// All solutions of `goal`, one binding map per solution.
    async fn query(&self, goal: &Goal) -> Result<Vec<Bindings>>;
}

/// In-process fact base.
///
/// Stored facts are matched directly. Derived predicates are evaluated by
/// built-in rules, currently:
///
/// ```text
/// inconsistent_composition(C) :- composes_contents(M1, C), composes_contents(M2, C), M1 \== M2.
/// ```
///
/// It yields one solution per offending `C`.
#[derive(Default)]
pub struct EmbeddedEngine {
    state: RwLock<FactBase>,
}

#[derive(Default)]
struct FactBase {
    facts: Vec<Fact>,
    seen: HashSet<String>,
}

impl EmbeddedEngine {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.state.read().facts.len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn solve(&self, goal: &Goal) -> Result<Vec<Bindings>> {
        let state = self.state.read();
        let candidates: Vec<Vec<Term>> = match (goal.predicate.as_str(), goal.args.len()) {
            ("inconsistent_composition", 1) => inconsistent_composition(&state.facts),
            _ => state
                .facts
                .iter()
                .filter(|f| f.predicate == goal.predicate && f.arity() == goal.args.len())
                .map(|f| f.args.clone())
                .collect(),
        };
        Ok(candidates.iter().filter_map(|args| unify(&goal.args, args)).collect())
    }
}

/// Contents ids with more than one `composes_contents` root, once each, in order of first appearance.
fn inconsistent_composition(facts: &[Fact]) -> Vec<Vec<Term>> {
    let mut order: Vec<&Term> = Vec::new();
    let mut roots: HashMap<String, HashSet<String>> = HashMap::new();
    for f in facts.iter().filter(|f| f.predicate == "composes_contents" && f.arity() == 2) {
        let (m, c) = (&f.args[0], &f.args[1]);
        roots
            .entry(term_key(c))
            .or_insert_with(|| {
                order.push(c);
                HashSet::new()
            })
            .insert(term_key(m));
    }
    order
        .into_iter()
        .filter(|c| roots.get(&term_key(c)).is_some_and(|r| r.len() > 1))
        .map(|c| vec![c.clone()])
        .collect()
}

/// Identity key under Prolog atom equality.
fn term_key(t: &Term) -> String {
    t.text().map_or_else(|| t.to_string(), str::to_string)
}

fn unify(pattern: &[GoalArg], args: &[Term]) -> Option<Bindings> {
    let mut b = Bindings::new();
    for (p, a) in pattern.iter().zip(args) {
        match p {
            GoalArg::Const(t) if !t.same(a) => return None,
            GoalArg::Const(_) => {}
            GoalArg::Var(v) if v == "_" => {}
            GoalArg::Var(v) => match b.get(v) {
                Some(bound) if !bound.same(a) => return None,
                Some(_) => {}
                None => {
                    b.insert(v.clone(), a.clone());
                }
            },
        }
    }
    Some(b)
}

#[async_trait]
impl RuleEngine for EmbeddedEngine {
    async fn assert_facts(&self, facts: &[Fact]) -> Result<()> {
        if facts.iter().any(|f| f.predicate.is_empty()) {
            return Err(Error::validation("fact with empty predicate"));
        }
        let mut state = self.state.write();
        for f in facts {
            if state.seen.insert(f.to_string()) {
                state.facts.push(f.clone());
            }
        }
        Ok(())
    }

    async fn query(&self, goal: &Goal) -> Result<Vec<Bindings>> {
        self.solve(goal)
    }
}
