//! Per-model default registries and the inheritance merge over them.

use indexmap::{IndexMap, IndexSet};

use crate::default::{resolve_source, ComputeFn, DefaultConfig, DefaultSource, DefaultSpec};

/// The defaults one model declares itself, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    specs: IndexMap<String, DefaultSpec>,
    non_nil: IndexSet<String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }
    /// Declares (or re-declares) the default for `attribute`.
    ///
    /// A re-declaration replaces the spec but keeps the attribute's position. Returns
    /// `false`, leaving the registry untouched, when the declaration carries neither a
    /// value nor a function.
    pub fn declare(
        &mut self,
        attribute: impl Into<String>,
        config: DefaultConfig,
        compute: Option<ComputeFn>,
    ) -> bool {
        let Some((source, allows_nil)) = resolve_source(config, compute) else {
            return false;
        };
        self.insert(attribute.into(), source, allows_nil);
        true
    }
    pub(crate) fn insert(&mut self, attribute: String, source: DefaultSource, allows_nil: bool) {
        if !allows_nil {
            self.non_nil.insert(attribute.clone());
        }
        // IndexMap::insert keeps the slot of an existing key
        self.specs
            .insert(attribute.clone(), DefaultSpec::new(attribute, source, allows_nil));
    }
    pub fn get(&self, attribute: &str) -> Option<&DefaultSpec> {
        self.specs.get(attribute)
    }
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DefaultSpec)> {
        self.specs.iter().map(|(k, v)| (k.as_str(), v))
    }
    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.specs.keys().map(String::as_str)
    }
    pub fn non_nil_attributes(&self) -> &IndexSet<String> {
        &self.non_nil
    }
    pub fn len(&self) -> usize {
        self.specs.len()
    }
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

/// The inheritance-merged view of a model's defaults, in evaluation order.
#[derive(Debug, Clone, Default)]
pub struct EffectiveSpecSet {
    specs: IndexMap<String, DefaultSpec>,
    non_nil: IndexSet<String>,
}

impl EffectiveSpecSet {
    /// Layers `own` over `base`. Keys both define keep `base`'s position and take
    /// `own`'s spec; keys only `own` defines follow, in `own`'s order.
    pub fn merge(base: &EffectiveSpecSet, own: Option<&Registry>) -> Self {
        let mut merged = base.clone();
        if let Some(own) = own {
            for (attribute, spec) in own.specs.iter() {
                merged.specs.insert(attribute.clone(), spec.clone());
            }
            for attribute in own.non_nil.iter() {
                merged.non_nil.insert(attribute.clone());
            }
        }
        merged
    }
    pub fn get(&self, attribute: &str) -> Option<&DefaultSpec> {
        self.specs.get(attribute)
    }
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DefaultSpec)> {
        self.specs.iter().map(|(k, v)| (k.as_str(), v))
    }
    pub fn attributes(&self) -> Vec<&str> {
        self.specs.keys().map(String::as_str).collect()
    }
    /// True when some model in the chain declared `attribute` with `allows_nil = false`.
    pub fn disallows_nil(&self, attribute: &str) -> bool {
        self.non_nil.contains(attribute)
    }
    pub fn non_nil_attributes(&self) -> &IndexSet<String> {
        &self.non_nil
    }
    pub fn len(&self) -> usize {
        self.specs.len()
    }
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::Value;
    use crate::default::{computed, DefaultOptions};

    fn value(v: i64) -> DefaultConfig {
        DefaultConfig::Value(Value::Integer(v))
    }

    #[test]
    fn redeclaration_keeps_position() {
        let mut registry = Registry::new();
        assert!(registry.declare("a", value(1), None));
        assert!(registry.declare("b", value(2), None));
        assert!(registry.declare("a", value(3), None));
        assert_eq!(registry.attributes().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(
            registry.get("a").unwrap().source().static_value(),
            Some(&Value::Integer(3))
        );
    }

    #[test]
    fn non_nil_is_never_reset() {
        let mut registry = Registry::new();
        registry.declare("a", DefaultOptions::new().value(1).allows_nil(false).into(), None);
        registry.declare("a", value(2), None);
        assert!(registry.non_nil_attributes().contains("a"));
        assert!(registry.get("a").unwrap().allows_nil());
    }

    #[test]
    fn empty_declaration_is_rejected() {
        let mut registry = Registry::new();
        assert!(!registry.declare("a", DefaultConfig::Omitted, None));
        assert!(registry.is_empty());
    }

    #[test]
    fn merge_keeps_parent_order_and_appends_new() {
        let mut parent = Registry::new();
        parent.declare("a", value(1), None);
        parent.declare("b", value(2), None);
        let mut child = Registry::new();
        child.declare("c", value(30), None);
        child.declare("a", DefaultConfig::Omitted, Some(computed(|_| Ok(Value::Integer(10)))));

        let base = EffectiveSpecSet::merge(&EffectiveSpecSet::default(), Some(&parent));
        let merged = EffectiveSpecSet::merge(&base, Some(&child));
        assert_eq!(merged.attributes(), vec!["a", "b", "c"]);
        assert!(merged.get("a").unwrap().source().is_computed());
        // the parent's view is untouched
        assert!(!base.get("a").unwrap().source().is_computed());
        assert!(base.get("c").is_none());
    }

    #[test]
    fn merge_unions_non_nil() {
        let mut parent = Registry::new();
        parent.declare("a", DefaultOptions::new().value(1).allows_nil(false).into(), None);
        let mut child = Registry::new();
        child.declare("b", DefaultOptions::new().value(2).allows_nil(false).into(), None);
        child.declare("a", value(3), None);

        let base = EffectiveSpecSet::merge(&EffectiveSpecSet::default(), Some(&parent));
        let merged = EffectiveSpecSet::merge(&base, Some(&child));
        assert!(merged.disallows_nil("a"));
        assert!(merged.disallows_nil("b"));
        assert_eq!(merged.non_nil_attributes().len(), 2);
    }
}
