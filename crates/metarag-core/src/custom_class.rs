//! Named class nodes holding attributes and child classes.
//!
//! A `CustomClass` tree is the permanent representation of domain-specific
//! extensions. Consumers navigate it by path (`["Vessel", "Engine", "power"]`)
//! instead of generating types for it.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::attribute::{Attribute, Datatype};
use crate::error::{Error, Result};
use crate::ids::{short_id, IdPrefix};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomClass {
    pub id: String,
    pub classname: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub children: Vec<CustomClass>,
}

/// One row of the flat "additional attribute" form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatAttribute {
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub classname: String,
    pub key: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub datatype: Datatype,
    #[serde(default)]
    pub description: String,
}

impl CustomClass {
    pub fn new(classname: impl Into<String>) -> Self {
        Self {
            id: short_id(IdPrefix::CustomClass),
            classname: classname.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn add_attribute(&mut self, attribute: Attribute) -> Result<()> {
        if self.attribute(&attribute.key).is_some() {
            return Err(Error::validation(format!(
                "class '{}': duplicate attribute key '{}'",
                self.classname, attribute.key
            )));
        }
        self.attributes.push(attribute);
        Ok(())
    }

    pub fn add_child(&mut self, child: CustomClass) -> Result<()> {
        if self.child(&child.classname).is_some() {
            return Err(Error::validation(format!(
                "class '{}': duplicate child class '{}'",
                self.classname, child.classname
            )));
        }
        self.children.push(child);
        Ok(())
    }

    pub fn attribute(&self, key: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.key == key)
    }

    pub fn child(&self, classname: &str) -> Option<&CustomClass> {
        self.children.iter().find(|c| c.classname == classname)
    }

    fn child_mut_or_insert(&mut self, classname: &str) -> &mut CustomClass {
        let idx = match self.children.iter().position(|c| c.classname == classname) {
            Some(i) => i,
            None => {
                self.children.push(CustomClass::new(classname));
                self.children.len() - 1
            }
        };
        &mut self.children[idx]
    }

    /// Look up an attribute by `[child classname..., key]`, relative to this class.
    pub fn get_by_path(&self, path: &[&str]) -> Option<&Attribute> {
        let (key, classes) = path.split_last()?;
        let mut node = self;
        for segment in classes {
            node = node.child(segment)?;
        }
        node.attribute(key)
    }

    /// Place `attribute` at `[child classname...]`, creating missing classes.
    /// The last path segment names the key and overrides `attribute.key`.
    /// An existing attribute under that key is replaced.
    pub fn set_by_path(&mut self, path: &[&str], mut attribute: Attribute) -> Result<()> {
        let (key, classes) = path
            .split_last()
            .ok_or_else(|| Error::validation("set_by_path: empty path"))?;
        if key.is_empty() {
            return Err(Error::validation("set_by_path: empty key"));
        }
        let mut node = self;
        for segment in classes {
            node = node.child_mut_or_insert(segment);
        }
        attribute.key = (*key).to_string();
        match node.attributes.iter().position(|a| a.key == *key) {
            Some(i) => node.attributes[i] = attribute,
            None => node.attributes.push(attribute),
        }
        Ok(())
    }

    /// Build a tree `root/namespace/classname/key` from flat rows.
    /// Empty namespace or classname segments are collapsed; rows without a key are skipped.
    pub fn from_flat_attributes(root: impl Into<String>, rows: &[FlatAttribute]) -> Result<Self> {
        let mut tree = CustomClass::new(root);
        for row in rows {
            if row.key.trim().is_empty() {
                tracing::warn!(namespace = %row.namespace, classname = %row.classname, "skipping attribute row without key");
                continue;
            }
            let path: Vec<&str> = [row.namespace.as_str(), row.classname.as_str(), row.key.as_str()]
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect();
            let (_, classes) = path.split_last().ok_or_else(|| Error::validation("empty attribute path"))?;
            if tree.get_by_path(&path).is_some() {
                return Err(Error::validation(format!(
                    "duplicate attribute '{}' under '{}'",
                    row.key,
                    classes.join("/")
                )));
            }
            let attr = Attribute::new(row.key.clone(), row.value.clone(), row.datatype.clone())
                .with_description(row.description.clone());
            tree.set_by_path(&path, attr)?;
        }
        Ok(tree)
    }

    /// Number of attributes on this node and all descendants.
    pub fn attribute_count(&self) -> usize {
        self.attributes.len() + self.children.iter().map(CustomClass::attribute_count).sum::<usize>()
    }

    pub fn to_dict(&self) -> Value {
        json!({
            "id": self.id,
            "classname": self.classname,
            "attributes": self.attributes.iter().map(Attribute::to_dict).collect::<Vec<_>>(),
            "children": self.children.iter().map(CustomClass::to_dict).collect::<Vec<_>>(),
        })
    }
}
