use defaulter::matcher::set_default_value_for;
use defaulter::{Catalog, DefaultConfig, DefaultOptions, DefaulterError, Value};

fn setup() -> Catalog {
    let mut catalog = Catalog::new();
    catalog.define_model("Book", None).expect("book");
    catalog.define_model("Novel", Some("Book")).expect("novel");
    catalog
}

#[test]
fn redeclaration_replaces_in_place() {
    let mut catalog = setup();
    catalog.default_value_for("Book", "number", 1).unwrap();
    catalog.default_value_for("Book", "count", 2).unwrap();
    catalog.default_value_for("Book", "number", 3).unwrap();
    let registry = catalog.registry("Book").unwrap();
    assert_eq!(registry.attributes().collect::<Vec<_>>(), vec!["number", "count"]);
    assert_eq!(
        registry.get("number").unwrap().source().static_value(),
        Some(&Value::Integer(3))
    );
}

#[test]
fn function_wins_over_value() {
    let mut catalog = setup();
    catalog
        .default_value_by_with(
            "Book",
            "number",
            DefaultOptions::new().value(1).allows_nil(false),
            |_| Ok(Value::Integer(2)),
        )
        .unwrap();
    let spec = catalog.effective("Book").unwrap().get("number").cloned().unwrap();
    assert!(spec.source().is_computed());
    assert!(!spec.allows_nil());
}

#[test]
fn explicit_nil_value_is_a_default() {
    let mut catalog = setup();
    catalog
        .default_value_with("Book", "number", DefaultOptions::new().value(Value::Nil))
        .unwrap();
    assert_eq!(
        catalog.registry("Book").unwrap().get("number").unwrap().source().static_value(),
        Some(&Value::Nil)
    );
}

#[test]
fn declaration_without_value_or_function_is_rejected() {
    let mut catalog = setup();
    let result = catalog.default_value_with("Book", "number", DefaultOptions::new().allows_nil(false));
    assert!(matches!(result, Err(DefaulterError::Declaration { .. })));
    let result = catalog.declare_default("Book", "number", DefaultConfig::Omitted, None);
    assert!(matches!(result, Err(DefaulterError::Declaration { .. })));
    assert!(catalog.registry("Book").is_none());
}

#[test]
fn declarations_need_a_defined_model() {
    let mut catalog = setup();
    assert!(matches!(
        catalog.default_value_for("User", "name", "x"),
        Err(DefaulterError::UnknownModel(name)) if name == "User"
    ));
    assert!(matches!(catalog.effective("User"), Err(DefaulterError::UnknownModel(_))));
}

#[test]
fn registry_is_created_lazily() {
    let mut catalog = setup();
    assert!(catalog.registry("Novel").is_none());
    assert!(catalog.effective("Novel").unwrap().is_empty());
    catalog.default_value_for("Novel", "genre", "fiction").unwrap();
    assert_eq!(catalog.registry("Novel").unwrap().len(), 1);
    assert!(catalog.registry("Book").is_none());
}

#[test]
fn matcher_accepts_declared_defaults() {
    let mut catalog = setup();
    catalog.default_value_for("Book", "number", 1234).unwrap();
    catalog
        .default_value_with("Book", "flag", DefaultOptions::new().value(true).allows_nil(false))
        .unwrap();
    catalog.default_value_by("Book", "count", |_| Ok(Value::Integer(1))).unwrap();

    set_default_value_for("number").check(&catalog, "Book").unwrap();
    set_default_value_for("number").with_value(1234).check(&catalog, "Book").unwrap();
    set_default_value_for("flag")
        .with_value(true)
        .and_disallow_nil()
        .check(&catalog, "Book")
        .unwrap();
    set_default_value_for("count").check(&catalog, "Book").unwrap();
    // inherited
    set_default_value_for("number").with_value(1234).check(&catalog, "Novel").unwrap();
    set_default_value_for("title").check_not(&catalog, "Book").unwrap();
}

#[test]
fn matcher_reports_what_it_expected() {
    let mut catalog = setup();
    catalog.default_value_for("Book", "number", 1234).unwrap();

    let err = set_default_value_for("number")
        .with_value(1)
        .check(&catalog, "Book")
        .unwrap_err();
    assert_eq!(err.to_string(), "expected to set default value for 'number' with value '1'");

    let err = set_default_value_for("number")
        .and_disallow_nil()
        .check(&catalog, "Book")
        .unwrap_err();
    assert_eq!(err.to_string(), "expected to set default value for 'number' and disallows_nil");

    let err = set_default_value_for("number").check_not(&catalog, "Book").unwrap_err();
    assert_eq!(err.to_string(), "expected to not set default value for 'number'");

    // computed defaults carry no value to compare
    catalog.default_value_by("Book", "count", |_| Ok(Value::Integer(1))).unwrap();
    assert!(
        !set_default_value_for("count")
            .with_value(1)
            .matches(&catalog, "Book")
            .unwrap()
    );
}
