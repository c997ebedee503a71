//! Ground terms, facts and goals in Prolog surface syntax.

use std::collections::BTreeMap;
use std::fmt;

use metarag_core::extent::fmt_float;

#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// Symbolic constant such as `id` or `topicCategory`; quoted only when it must be.
    Atom(String),
    /// Text value; always written as a quoted atom.
    Str(String),
    Int(i64),
    Float(f64),
    Compound(String, Vec<Term>),
}

impl Term {
    pub fn atom(s: impl Into<String>) -> Self { Self::Atom(s.into()) }

    pub fn str(s: impl Into<String>) -> Self { Self::Str(s.into()) }

    /// Text of an atom-like term. `Atom("a")` and `Str("a")` denote the same Prolog atom.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Atom(s) | Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Structural equality under Prolog atom identity.
    pub fn same(&self, other: &Term) -> bool {
        match (self, other) {
            (Self::Compound(f, a), Self::Compound(g, b)) => {
                f == g && a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same(y))
            }
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (a, b) => matches!((a.text(), b.text()), (Some(x), Some(y)) if x == y),
        }
    }
}

fn is_bare_atom(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `'...'` with `\` and `'` escaped.
pub fn quote_atom(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn write_args(f: &mut fmt::Formatter<'_>, name: &str, args: &[impl fmt::Display]) -> fmt::Result {
    f.write_str(&render_functor(name))?;
    f.write_str("(")?;
    for (i, a) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{a}")?;
    }
    f.write_str(")")
}

fn render_functor(name: &str) -> String {
    if is_bare_atom(name) { name.to_string() } else { quote_atom(name) }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Atom(s) => f.write_str(&render_functor(s)),
            Self::Str(s) => f.write_str(&quote_atom(s)),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) if x.is_finite() => f.write_str(&fmt_float(*x)),
            Self::Float(x) => f.write_str(&quote_atom(&x.to_string())),
            Self::Compound(name, args) => write_args(f, name, args),
        }
    }
}

impl From<&str> for Term {
    fn from(s: &str) -> Self { Self::Str(s.to_string()) }
}
impl From<String> for Term {
    fn from(s: String) -> Self { Self::Str(s) }
}
impl From<&String> for Term {
    fn from(s: &String) -> Self { Self::Str(s.clone()) }
}
impl From<i64> for Term {
    fn from(i: i64) -> Self { Self::Int(i) }
}
impl From<f64> for Term {
    fn from(x: f64) -> Self { Self::Float(x) }
}

/// A ground predicate instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Fact {
    pub predicate: String,
    pub args: Vec<Term>,
}

impl Fact {
    pub fn new(predicate: impl Into<String>, args: Vec<Term>) -> Self {
        Self { predicate: predicate.into(), args }
    }

    pub fn arity(&self) -> usize { self.args.len() }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.is_empty() {
            return f.write_str(&render_functor(&self.predicate));
        }
        write_args(f, &self.predicate, &self.args)
    }
}

/// `fact!("pred", a, b)` builds a `Fact` converting each argument into a `Term`.
#[macro_export]
macro_rules! fact {
    ($pred:expr $(, $arg:expr)* $(,)?) => {
        $crate::term::Fact::new($pred, vec![$($crate::term::Term::from($arg)),*])
    };
}

#[derive(Debug, Clone, PartialEq)]
pub enum GoalArg {
    Var(String),
    Const(Term),
}

impl fmt::Display for GoalArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Var(v) => f.write_str(v),
            Self::Const(t) => write!(f, "{t}"),
        }
    }
}

/// A single-literal query. Variable names follow Prolog convention (`X`, `Contents`).
#[derive(Debug, Clone, PartialEq)]
pub struct Goal {
    pub predicate: String,
    pub args: Vec<GoalArg>,
}

impl Goal {
    pub fn new(predicate: impl Into<String>, args: Vec<GoalArg>) -> Self {
        Self { predicate: predicate.into(), args }
    }

    pub fn var(name: impl Into<String>) -> GoalArg { GoalArg::Var(name.into()) }

    pub fn constant(t: impl Into<Term>) -> GoalArg { GoalArg::Const(t.into()) }

    pub fn inconsistent_composition() -> Self {
        Self::new("inconsistent_composition", vec![Self::var("X")])
    }

    pub fn variables(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for a in &self.args {
            if let GoalArg::Var(v) = a {
                if !seen.contains(&v.as_str()) {
                    seen.push(v);
                }
            }
        }
        seen
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.is_empty() {
            return f.write_str(&render_functor(&self.predicate));
        }
        write_args(f, &self.predicate, &self.args)
    }
}

/// Variable name to bound value, one map per solution.
pub type Bindings = BTreeMap<String, Term>;
