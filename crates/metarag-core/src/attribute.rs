//! Schema-less attribute nodes and permissive value coercion.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

use crate::error::Error;
use crate::ids::{short_id, IdPrefix};

/// Declared type of an attribute value. Unknown names are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Datatype {
    Int,
    Float,
    Bool,
    Str,
    Other(String),
    #[default]
    Unspecified,
}

impl Datatype {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "" => Self::Unspecified,
            "int" | "integer" => Self::Int,
            "float" | "double" => Self::Float,
            "bool" | "boolean" => Self::Bool,
            "str" | "string" => Self::Str,
            _ => Self::Other(s.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Str => "str",
            Self::Other(s) => s,
            Self::Unspecified => "",
        }
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Datatype {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Datatype {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Ok(Self::parse(&s))
    }
}

/// Result of a permissive conversion. On failure `value` is the original and
/// `diagnostic` says why.
#[derive(Debug)]
pub struct Coercion {
    pub value: Value,
    pub diagnostic: Option<Error>,
}

impl Coercion {
    fn ok(value: Value) -> Self { Self { value, diagnostic: None } }

    fn failed(original: &Value, datatype: &Datatype) -> Self {
        let shown = match original {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        tracing::warn!(value = %shown, datatype = %datatype, "attribute value kept unconverted");
        Self {
            value: original.clone(),
            diagnostic: Some(Error::Conversion { value: shown, datatype: datatype.to_string() }),
        }
    }
}

const TRUTHY: [&str; 4] = ["true", "1", "yes", "t"];

/// Convert `value` to `datatype`. Never fails: unconvertible input is returned unchanged.
pub fn coerce(value: &Value, datatype: &Datatype) -> Coercion {
    match datatype {
        Datatype::Int => match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Coercion::ok(value.clone()),
            Value::Number(n) => match n.as_f64() {
                Some(f) if f.is_finite() => Coercion::ok(json!(f.trunc() as i64)),
                _ => Coercion::failed(value, datatype),
            },
            Value::String(s) => match s.trim().parse::<i64>() {
                Ok(i) => Coercion::ok(json!(i)),
                Err(_) => Coercion::failed(value, datatype),
            },
            Value::Bool(b) => Coercion::ok(json!(i64::from(*b))),
            _ => Coercion::failed(value, datatype),
        },
        Datatype::Float => match value {
            Value::Number(n) => match n.as_f64() {
                Some(f) => Coercion::ok(json!(f)),
                None => Coercion::failed(value, datatype),
            },
            Value::String(s) => match s.trim().parse::<f64>() {
                Ok(f) if f.is_finite() => Coercion::ok(json!(f)),
                _ => Coercion::failed(value, datatype),
            },
            Value::Bool(b) => Coercion::ok(json!(if *b { 1.0 } else { 0.0 })),
            _ => Coercion::failed(value, datatype),
        },
        Datatype::Bool => {
            let b = match value {
                Value::Bool(b) => *b,
                Value::String(s) => TRUTHY.contains(&s.trim().to_ascii_lowercase().as_str()),
                Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
                Value::Null => false,
                Value::Array(a) => !a.is_empty(),
                Value::Object(o) => !o.is_empty(),
            };
            Coercion::ok(Value::Bool(b))
        }
        Datatype::Str => match value {
            Value::String(_) => Coercion::ok(value.clone()),
            other => Coercion::ok(Value::String(other.to_string())),
        },
        Datatype::Other(_) | Datatype::Unspecified => Coercion::ok(value.clone()),
    }
}

/// A typed key-value node. Children form a tree; sibling keys are unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub id: String,
    pub key: String,
    pub value: Value,
    #[serde(default)]
    pub datatype: Datatype,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Attribute>,
}

impl Attribute {
    /// Build an attribute, coercing `value` to `datatype`.
    pub fn new(key: impl Into<String>, value: Value, datatype: Datatype) -> Self {
        let coerced = coerce(&value, &datatype);
        Self {
            id: short_id(IdPrefix::Attribute),
            key: key.into(),
            value: coerced.value,
            datatype,
            description: String::new(),
            children: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Append a child. A sibling with the same key is rejected.
    pub fn add_child(&mut self, child: Attribute) -> crate::error::Result<()> {
        if self.children.iter().any(|c| c.key == child.key) {
            return Err(Error::validation(format!("attribute '{}': duplicate child key '{}'", self.key, child.key)));
        }
        self.children.push(child);
        Ok(())
    }

    /// Re-run coercion on the stored value, returning the diagnostic if any.
    pub fn coerced(&self) -> Coercion {
        coerce(&self.value, &self.datatype)
    }

    pub fn to_dict(&self) -> Value {
        let mut v = json!({
            "id": self.id,
            "key": self.key,
            "value": self.value,
            "datatype": self.datatype.as_str(),
            "description": self.description,
        });
        if !self.children.is_empty() {
            v["children"] = Value::Array(self.children.iter().map(Attribute::to_dict).collect());
        }
        v
    }
}
