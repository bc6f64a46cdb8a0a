//! Setting dictionaries with use-propagation provenance.

use std::collections::BTreeMap;

use ghpc_common::error::Result;
use ghpc_common::types::ModuleId;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::expression::eval::{EvalContext, eval_value};
use crate::value::Value;

/// One dictionary entry: a value and the modules it was propagated from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entry {
    /// The stored value.
    pub value: Value,
    product_of_use: Vec<ModuleId>,
}

impl Entry {
    /// An entry set explicitly by the user.
    #[must_use]
    pub const fn new(value: Value) -> Self {
        Self {
            value,
            product_of_use: Vec::new(),
        }
    }

    /// An entry derived from the outputs of `modules` by `use` propagation.
    ///
    /// The module list is kept sorted and free of duplicates.
    #[must_use]
    pub fn as_product_of_module_use(value: Value, modules: impl IntoIterator<Item = ModuleId>) -> Self {
        let mut product_of_use: Vec<ModuleId> = modules.into_iter().collect();
        product_of_use.sort();
        product_of_use.dedup();
        Self {
            value,
            product_of_use,
        }
    }

    /// Modules this entry was propagated from; empty for user-set values.
    #[must_use]
    pub fn is_product_of_module_use(&self) -> &[ModuleId] {
        &self.product_of_use
    }
}

/// String-keyed map of [`Entry`] values.
///
/// Readers always get copies, never references into the map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dict {
    entries: BTreeMap<String, Entry>,
}

impl Dict {
    /// Creates an empty dictionary.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Value of `key`, or [`Value::Null`] when absent.
    #[must_use]
    pub fn get(&self, key: &str) -> Value {
        self.entries
            .get(key)
            .map(|e| e.value.clone())
            .unwrap_or_default()
    }

    /// Entry of `key`, including provenance.
    #[must_use]
    pub fn entry(&self, key: &str) -> Option<Entry> {
        self.entries.get(key).cloned()
    }

    /// Returns `true` if `key` is present.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Sets a user value, dropping any provenance.
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        let _ = self.entries.insert(key.into(), Entry::new(value));
        self
    }

    /// Stores an entry as is.
    pub fn set_entry(&mut self, key: impl Into<String>, entry: Entry) -> &mut Self {
        let _ = self.entries.insert(key.into(), entry);
        self
    }

    /// Builder form of [`Dict::set`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        let _ = self.set(key, value);
        self
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key).map(|e| e.value)
    }

    /// Keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Copies of all values.
    #[must_use]
    pub fn items(&self) -> BTreeMap<String, Value> {
        self.entries
            .iter()
            .map(|(k, e)| (k.clone(), e.value.clone()))
            .collect()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The dictionary as an object value.
    #[must_use]
    pub fn as_object(&self) -> Value {
        Value::Object(self.items())
    }

    /// Evaluates every value, keeping provenance.
    ///
    /// # Errors
    ///
    /// Returns the first evaluation error.
    pub fn eval(&self, ctx: &mut EvalContext<'_>) -> Result<Self> {
        let mut out = Self::new();
        for (k, e) in &self.entries {
            let value = eval_value(&e.value, ctx)?;
            let _ = out.entries.insert(
                k.clone(),
                Entry {
                    value,
                    product_of_use: e.product_of_use.clone(),
                },
            );
        }
        Ok(out)
    }

    /// Replaces every value with `f(key, value)`.
    ///
    /// # Errors
    ///
    /// Propagates the first error of `f`.
    pub fn try_map_values(&mut self, mut f: impl FnMut(&str, &Value) -> Result<Value>) -> Result<()> {
        for (k, e) in &mut self.entries {
            e.value = f(k, &e.value)?;
        }
        Ok(())
    }
}

impl FromIterator<(String, Value)> for Dict {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k, Entry::new(v))).collect(),
        }
    }
}

impl Serialize for Dict {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(k, e)| (k, &e.value)))
    }
}

impl<'de> Deserialize<'de> for Dict {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let items = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?;
        Ok(items.unwrap_or_default().into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_copies() {
        let mut d = Dict::new().with("zones", Value::List(vec![Value::from("a")]));
        let mut copy = d.get("zones");
        if let Value::List(items) = &mut copy {
            items.push(Value::from("b"));
        }
        assert_eq!(d.get("zones"), Value::List(vec![Value::from("a")]));
        let _ = d.set("zones", copy);
        assert_eq!(d.get("zones"), Value::List(vec![Value::from("a"), Value::from("b")]));
    }

    #[test]
    fn missing_key_is_null() {
        assert!(Dict::new().get("nope").is_null());
    }

    #[test]
    fn provenance_is_sorted_and_deduplicated() {
        let e = Entry::as_product_of_module_use(
            Value::from("x"),
            [ModuleId::new("b"), ModuleId::new("a"), ModuleId::new("b")],
        );
        assert_eq!(e.is_product_of_module_use(), &[ModuleId::new("a"), ModuleId::new("b")]);
        assert!(Entry::new(Value::Null).is_product_of_module_use().is_empty());
    }

    #[test]
    fn set_clears_provenance() {
        let mut d = Dict::new();
        let _ = d.set_entry(
            "x",
            Entry::as_product_of_module_use(Value::from("v"), [ModuleId::new("m")]),
        );
        assert_eq!(d.entry("x").map(|e| e.is_product_of_module_use().len()), Some(1));
        let _ = d.set("x", Value::from("w"));
        assert_eq!(d.entry("x").map(|e| e.is_product_of_module_use().len()), Some(0));
    }

    #[test]
    fn deserializes_null_as_empty() {
        let d: Dict = serde_yaml::from_str("~").expect("deserialize");
        assert!(d.is_empty());
    }

    #[test]
    fn eval_resolves_expressions() {
        let d: Dict = serde_yaml::from_str("a: $(vars.x)\nb: 1").expect("deserialize");
        let mut vars = BTreeMap::new();
        let _ = vars.insert("x".to_owned(), Value::from("X"));
        let mut ctx = EvalContext::new(&vars);
        let got = d.eval(&mut ctx).expect("eval");
        assert_eq!(got.get("a"), Value::from("X"));
        assert_eq!(got.get("b"), Value::Number(1.0));
    }
}
