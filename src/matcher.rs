//! Assertions over declared defaults, for use in test suites.
//!
//! ```
//! use defaulter::{Catalog, DefaultOptions, matcher::set_default_value_for};
//!
//! let mut catalog = Catalog::new();
//! catalog.define_model("Book", None).unwrap();
//! catalog
//!     .default_value_with("Book", "pages", DefaultOptions::new().value(1).allows_nil(false))
//!     .unwrap();
//! set_default_value_for("pages")
//!     .with_value(1)
//!     .and_disallow_nil()
//!     .check(&catalog, "Book")
//!     .unwrap();
//! ```

use crate::catalog::Catalog;
use crate::datatype::Value;
use crate::error::{DefaulterError, Result};

pub fn set_default_value_for(attribute: impl Into<String>) -> SetDefaultValueFor {
    SetDefaultValueFor {
        attribute: attribute.into(),
        expected_value: None,
        expected_disallowed_nil: false,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetDefaultValueFor {
    attribute: String,
    expected_value: Option<Value>,
    expected_disallowed_nil: bool,
}

impl SetDefaultValueFor {
    /// Also requires a static default equal to `value`.
    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.expected_value = Some(value.into());
        self
    }
    pub fn and_disallow_nil(mut self) -> Self {
        self.expected_disallowed_nil = true;
        self
    }
    pub fn description(&self) -> String {
        let mut message = format!("set default value for '{}'", self.attribute);
        if let Some(value) = &self.expected_value {
            message.push_str(&format!(" with value '{}'", value));
        }
        if self.expected_disallowed_nil {
            message.push_str(" and disallows_nil");
        }
        message
    }
    /// Whether `model`, inherited defaults included, satisfies the expectation.
    pub fn matches(&self, catalog: &Catalog, model: &str) -> Result<bool> {
        let effective = catalog.effective(model)?;
        let Some(spec) = effective.get(&self.attribute) else {
            return Ok(false);
        };
        let value_matches = match &self.expected_value {
            Some(expected) => spec.source().static_value() == Some(expected),
            None => true,
        };
        let nil_matches = !self.expected_disallowed_nil || effective.disallows_nil(&self.attribute);
        Ok(value_matches && nil_matches)
    }
    pub fn check(&self, catalog: &Catalog, model: &str) -> Result<()> {
        if self.matches(catalog, model)? {
            Ok(())
        } else {
            Err(DefaulterError::Expectation(format!("expected to {}", self.description())))
        }
    }
    pub fn check_not(&self, catalog: &Catalog, model: &str) -> Result<()> {
        if self.matches(catalog, model)? {
            Err(DefaulterError::Expectation(format!("expected to not {}", self.description())))
        } else {
            Ok(())
        }
    }
}
