//! Applying declared defaults to a freshly constructed or freshly loaded record.
//!
//! [`apply_defaults`] walks the effective defaults of the record's model in
//! evaluation order and, per attribute, decides whether the default applies:
//!
//! 1. New records consider every default; persisted records only those declared
//!    with `allows_nil = false`.
//! 2. The attribute has to be blank. A boolean column is blank only when nil, so an
//!    explicit `false` survives. Other columns are blank when nil or empty. Attributes
//!    without a column are asked through their getter, or their instance slot.
//! 3. On new records an attribute that is still flagged unchanged also qualifies,
//!    which lets a declared default replace a storage-level column default.
//! 4. Unless nil is disallowed, an attribute the caller named in the raw construction
//!    input (including protected ones the sanitizer dropped, multiparameter keys and
//!    nested-attribute writers) is left alone.
//!
//! A default that applies is written through the setter and its change flag cleared.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, trace};

use crate::catalog::Catalog;
use crate::error::Result;
use crate::record::Record;

lazy_static! {
    // `published_at(1i)` style keys carry one component of a multiparameter assignment
    static ref MULTIPARAMETER_KEY: Regex = Regex::new(r"^(?P<name>[^()]+)\((?P<index>\d+)(?P<cast>[a-z]?)\)$").unwrap();
}

/// Splits a multiparameter key such as `timestamp(1i)` into the attribute it assigns
/// to and the component's position.
pub fn split_multiparameter(key: &str) -> Option<(&str, usize)> {
    let captures = MULTIPARAMETER_KEY.captures(key)?;
    let name = captures.name("name")?.as_str();
    let index = captures.name("index")?.as_str().parse().ok()?;
    Some((name, index))
}

pub fn multiparameter_target(key: &str) -> Option<&str> {
    split_multiparameter(key).map(|(name, _)| name)
}

/// Applies every eligible default to `record`. Returns how many were applied.
///
/// A failing default function aborts the pass and its error is returned as is;
/// defaults applied before it stay applied.
pub fn apply_defaults(catalog: &Catalog, record: &mut dyn Record) -> Result<usize> {
    let effective = catalog.effective(record.model_name())?;
    let is_new = record.is_new_record();
    let mut applied = 0;
    for (attribute, spec) in effective.iter() {
        let enforced = effective.disallows_nil(attribute);
        if !is_new && !enforced {
            continue;
        }
        let blank = is_blank(&*record, attribute);
        let column_default_fired = is_new && record.attribute_changed(attribute) == Some(false);
        if !blank && !column_default_fired {
            continue;
        }
        if !enforced && explicitly_provided(&*record, attribute) {
            trace!(model = record.model_name(), attribute, "explicitly provided, default skipped");
            continue;
        }
        let value = spec.evaluate(&*record)?;
        trace!(model = record.model_name(), attribute, value = %value, "default applied");
        record.write_attribute(attribute, value)?;
        record.clear_change_flag(attribute);
        applied += 1;
    }
    debug!(model = record.model_name(), new_record = is_new, applied, "defaults resolved");
    Ok(applied)
}

pub fn is_blank(record: &dyn Record, attribute: &str) -> bool {
    match record.column_type(attribute) {
        Some(column_type) if column_type.is_boolean() => {
            record.read_attribute(attribute).is_none_or(|v| v.is_nil())
        }
        Some(_) => record.read_attribute(attribute).is_none_or(|v| v.is_blank()),
        None => match record.read_getter(attribute) {
            Some(value) => value.is_nil(),
            None => record.read_instance_slot(attribute).is_none_or(|v| v.is_nil()),
        },
    }
}

pub fn explicitly_provided(record: &dyn Record, attribute: &str) -> bool {
    let Some(input) = record.raw_construction_input() else {
        return false;
    };
    let named = input
        .keys()
        .any(|key| key == attribute || multiparameter_target(key) == Some(attribute));
    named
        || (input.contains_key(&format!("{}_attributes", attribute))
            && record.nested_attribute_writer_exists(attribute))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiparameter_keys() {
        assert_eq!(multiparameter_target("timestamp(1i)"), Some("timestamp"));
        assert_eq!(multiparameter_target("price(2f)"), Some("price"));
        assert_eq!(multiparameter_target("at(12)"), Some("at"));
        assert_eq!(multiparameter_target("timestamp"), None);
        assert_eq!(multiparameter_target("timestamp(i)"), None);
        assert_eq!(split_multiparameter("timestamp(3i)"), Some(("timestamp", 3)));
    }
}
