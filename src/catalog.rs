use std::sync::{Arc, Mutex, MutexGuard};

// model lookups are keyed by name, so a fast non-cryptographic hasher will do
use core::hash::BuildHasherDefault;
use seahash::SeaHasher;
use std::collections::HashMap;

use tracing::debug;

// our own stuff that we need
use crate::datatype::Value;
use crate::default::{computed, resolve_source, ComputeFn, Declaration, DefaultConfig, DefaultOptions};
use crate::error::{DefaulterError, Result};
use crate::record::Record;
use crate::registry::{EffectiveSpecSet, Registry};

pub type ModelHasher = BuildHasherDefault<SeaHasher>;

// ------------- Model -------------
#[derive(Debug)]
pub struct Model {
    name: String,
    parent: Option<String>,
    // created on the first declaration
    registry: Option<Registry>,
}

impl Model {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }
    pub fn registry(&self) -> Option<&Registry> {
        self.registry.as_ref()
    }
}

// ------------- Catalog -------------
// Owns one registry per model and the merged views derived from them.
pub struct Catalog {
    models: HashMap<String, Model, ModelHasher>,
    effective: Mutex<HashMap<String, Arc<EffectiveSpecSet>, ModelHasher>>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            models: HashMap::default(),
            effective: Mutex::new(HashMap::default()),
        }
    }
    /// Registers a model. A parent has to be defined before its subclasses, which
    /// also rules out cycles. Defining the same model twice is fine as long as the
    /// parent agrees.
    pub fn define_model(&mut self, name: impl Into<String>, parent: Option<&str>) -> Result<()> {
        let name = name.into();
        if let Some(parent) = parent {
            if !self.models.contains_key(parent) {
                return Err(DefaulterError::UnknownModel(parent.to_string()));
            }
        }
        if let Some(existing) = self.models.get(&name) {
            if existing.parent() != parent {
                return Err(DefaulterError::DuplicateModel(name));
            }
            return Ok(());
        }
        debug!(model = %name, parent = ?parent, "model defined");
        self.models.insert(
            name.clone(),
            Model {
                name,
                parent: parent.map(str::to_string),
                registry: None,
            },
        );
        Ok(())
    }
    pub fn is_defined(&self, model: &str) -> bool {
        self.models.contains_key(model)
    }
    pub fn model(&self, model: &str) -> Option<&Model> {
        self.models.get(model)
    }
    pub fn parent(&self, model: &str) -> Option<&str> {
        self.models.get(model).and_then(Model::parent)
    }
    /// The chain from `model` up to its root, `model` first.
    pub fn ancestors(&self, model: &str) -> Result<Vec<&str>> {
        let mut chain = Vec::new();
        let mut current = Some(model);
        while let Some(name) = current {
            let entry = self
                .models
                .get(name)
                .ok_or_else(|| DefaulterError::UnknownModel(name.to_string()))?;
            chain.push(entry.name());
            current = entry.parent();
        }
        Ok(chain)
    }
    /// The defaults `model` declares itself, without inherited ones.
    pub fn registry(&self, model: &str) -> Option<&Registry> {
        self.models.get(model).and_then(Model::registry)
    }

    // ------------- Declarations -------------
    /// Declares a default for `attribute` on `model`. When `compute` is given it
    /// takes precedence over any value in `config`.
    pub fn declare_default(
        &mut self,
        model: &str,
        attribute: &str,
        config: impl Into<DefaultConfig>,
        compute: Option<ComputeFn>,
    ) -> Result<()> {
        let entry = self
            .models
            .get_mut(model)
            .ok_or_else(|| DefaulterError::UnknownModel(model.to_string()))?;
        let (source, allows_nil) =
            resolve_source(config.into(), compute).ok_or_else(|| DefaulterError::Declaration {
                model: model.to_string(),
                attribute: attribute.to_string(),
                message: "neither a value nor a function was given".to_string(),
            })?;
        debug!(
            model,
            attribute,
            computed = source.is_computed(),
            allows_nil,
            "default declared"
        );
        entry
            .registry
            .get_or_insert_with(Registry::new)
            .insert(attribute.to_string(), source, allows_nil);
        self.invalidate();
        Ok(())
    }
    /// Static default given as a bare value.
    pub fn default_value_for(
        &mut self,
        model: &str,
        attribute: &str,
        value: impl Into<Value>,
    ) -> Result<()> {
        self.declare_default(model, attribute, DefaultConfig::Value(value.into()), None)
    }
    /// Static default given in the structured form.
    pub fn default_value_with(
        &mut self,
        model: &str,
        attribute: &str,
        options: DefaultOptions,
    ) -> Result<()> {
        self.declare_default(model, attribute, options, None)
    }
    /// Default computed per instance.
    pub fn default_value_by<F>(&mut self, model: &str, attribute: &str, f: F) -> Result<()>
    where
        F: Fn(&dyn Record) -> Result<Value> + Send + Sync + 'static,
    {
        self.declare_default(model, attribute, DefaultConfig::Omitted, Some(computed(f)))
    }
    /// Default computed per instance, with options such as `allows_nil`. Any value in
    /// `options` is ignored in favour of `f`.
    pub fn default_value_by_with<F>(
        &mut self,
        model: &str,
        attribute: &str,
        options: DefaultOptions,
        f: F,
    ) -> Result<()>
    where
        F: Fn(&dyn Record) -> Result<Value> + Send + Sync + 'static,
    {
        self.declare_default(model, attribute, options, Some(computed(f)))
    }
    /// Batch form, declared left to right.
    pub fn default_values<I, S>(&mut self, model: &str, declarations: I) -> Result<()>
    where
        I: IntoIterator<Item = (S, Declaration)>,
        S: AsRef<str>,
    {
        for (attribute, declaration) in declarations {
            let (config, compute) = declaration.split();
            self.declare_default(model, attribute.as_ref(), config, compute)?;
        }
        Ok(())
    }

    // ------------- Effective defaults -------------
    /// The inheritance-merged defaults for `model`.
    pub fn effective(&self, model: &str) -> Result<Arc<EffectiveSpecSet>> {
        let cached = self.cache()?.get(model).cloned();
        if let Some(found) = cached {
            return Ok(found);
        }
        let entry = self
            .models
            .get(model)
            .ok_or_else(|| DefaulterError::UnknownModel(model.to_string()))?;
        let base = match entry.parent() {
            Some(parent) => self.effective(parent)?,
            None => Arc::new(EffectiveSpecSet::default()),
        };
        let merged = Arc::new(EffectiveSpecSet::merge(&base, entry.registry()));
        self.cache()?
            .insert(model.to_string(), Arc::clone(&merged));
        Ok(merged)
    }
    fn cache(&self) -> Result<MutexGuard<'_, HashMap<String, Arc<EffectiveSpecSet>, ModelHasher>>> {
        self.effective
            .lock()
            .map_err(|e| DefaulterError::Lock(e.to_string()))
    }
    // any declaration may change the merged view of every descendant
    fn invalidate(&mut self) {
        match self.effective.get_mut() {
            Ok(cache) => cache.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}
