use std::sync::Arc;

use chrono::NaiveDate;
use defaulter::{
    attributes, AttributeMap, Catalog, ColumnType, Declaration, DefaultOptions, DefaulterError, Instance,
    Schema, Value,
};

fn book_schema() -> Schema {
    Schema::new("Book")
        .column("type", ColumnType::String)
        .column("number", ColumnType::Integer)
        .column_with_default("count", ColumnType::Integer, 1)
        .column("user_id", ColumnType::Integer)
        .column("timestamp", ColumnType::Timestamp)
        .column("stuff", ColumnType::Json)
        .column("flag", ColumnType::Boolean)
}

fn setup(schema: Schema) -> (Catalog, Arc<Schema>) {
    let mut catalog = Catalog::new();
    schema.define_in(&mut catalog).expect("model");
    (catalog, Arc::new(schema))
}

fn new_book(catalog: &Catalog, schema: &Arc<Schema>, input: &AttributeMap) -> Instance {
    Instance::new(catalog, schema, input).expect("instance")
}

#[test]
fn default_value_can_be_passed_as_argument() {
    let (mut catalog, book) = setup(book_schema());
    catalog.default_value_for("Book", "number", 1234).unwrap();
    assert_eq!(new_book(&catalog, &book, &attributes! {}).get("number"), Value::Integer(1234));
}

#[test]
fn default_value_can_be_computed() {
    let (mut catalog, book) = setup(book_schema());
    catalog.default_value_by("Book", "number", |_| Ok(Value::Integer(1234))).unwrap();
    assert_eq!(new_book(&catalog, &book, &attributes! {}).get("number"), Value::Integer(1234));
}

#[test]
fn record_under_construction_is_passed_to_the_function() {
    let (mut catalog, book) = setup(book_schema());
    catalog
        .default_value_by("Book", "type", |record| {
            assert!(record.is_new_record());
            Ok(Value::from(record.model_name()))
        })
        .unwrap();
    assert_eq!(new_book(&catalog, &book, &attributes! {}).get("type"), Value::from("Book"));
}

#[test]
fn defaults_are_evaluated_in_declaration_order() {
    let (mut catalog, book) = setup(book_schema());
    catalog.default_value_for("Book", "count", 5).unwrap();
    catalog
        .default_value_by("Book", "number", |record| {
            let count = record
                .read("count")
                .as_i64()
                .ok_or_else(|| DefaulterError::Callback("count is not set".to_string()))?;
            Ok(Value::Integer(count * 2))
        })
        .unwrap();
    let object = new_book(&catalog, &book, &attributes! {});
    assert_eq!(object.get("count"), Value::Integer(5));
    assert_eq!(object.get("number"), Value::Integer(10));
}

#[test]
fn batch_declaration() {
    let (mut catalog, book) = setup(book_schema());
    catalog
        .default_values(
            "Book",
            vec![
                ("type", Declaration::value("normal")),
                ("number", Declaration::computed(|_| Ok(Value::Integer(10 + 5)))),
                (
                    "timestamp",
                    Declaration::computed(|_| Ok(Value::Timestamp(chrono::Local::now().naive_local()))),
                ),
            ],
        )
        .unwrap();
    let object = new_book(&catalog, &book, &attributes! {});
    assert_eq!(object.get("type"), Value::from("normal"));
    assert_eq!(object.get("number"), Value::Integer(15));
    assert!(object.get("timestamp").as_timestamp().is_some());
}

#[test]
fn overwrites_storage_level_default() {
    let (mut catalog, book) = setup(book_schema());
    catalog.default_value_for("Book", "count", 1234).unwrap();
    assert_eq!(new_book(&catalog, &book, &attributes! {}).get("count"), Value::Integer(1234));
}

#[test]
fn doesnt_overwrite_values_provided_by_mass_assignment() {
    let (mut catalog, book) = setup(book_schema());
    catalog.default_value_for("Book", "number", 1234).unwrap();
    let object = new_book(&catalog, &book, &attributes! { "number" => 1, "count" => 2 });
    assert_eq!(object.get("number"), Value::Integer(1));
    assert_eq!(object.get("count"), Value::Integer(2));
}

#[test]
fn doesnt_overwrite_values_provided_by_multiparameter_assignment() {
    let (mut catalog, book) = setup(book_schema());
    let y2k = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
    catalog.default_value_for("Book", "timestamp", y2k).unwrap();
    let object = new_book(
        &catalog,
        &book,
        &attributes! { "timestamp(1i)" => "2009", "timestamp(2i)" => "1", "timestamp(3i)" => "1" },
    );
    let expected = NaiveDate::from_ymd_opt(2009, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
    assert_eq!(object.get("timestamp"), Value::Timestamp(expected));
}

#[test]
fn doesnt_overwrite_values_provided_by_constructor_block() {
    let (mut catalog, book) = setup(book_schema());
    catalog.default_value_for("Book", "number", 1234).unwrap();
    let object = Instance::builder(&book)
        .with_block(|x| {
            x.set("number", 1)?;
            x.set("count", 2)
        })
        .build(&catalog)
        .expect("instance");
    assert_eq!(object.get("number"), Value::Integer(1));
    assert_eq!(object.get("count"), Value::Integer(2));
}

#[test]
fn constructor_block_and_defaults_work_together() {
    let (mut catalog, book) = setup(book_schema());
    catalog.default_value_for("Book", "number", 1234).unwrap();
    let input = attributes! { "count" => 5678 };
    let mut initialized = false;
    let object = Instance::builder(&book)
        .attributes(&input)
        .with_block(|_| {
            initialized = true;
            Ok(())
        })
        .build(&catalog)
        .expect("instance");
    assert!(initialized);
    assert_eq!(object.get("number"), Value::Integer(1234));
    assert_eq!(object.get("count"), Value::Integer(5678));
}

fn stored_defaults_schema() -> Schema {
    Schema::new("Book")
        .column_with_default("count", ColumnType::Integer, 1)
        .column_with_default("flag", ColumnType::Boolean, false)
}

#[test]
fn block_values_equal_to_the_storage_default_are_kept() {
    let (mut catalog, book) = setup(stored_defaults_schema());
    catalog.default_value_for("Book", "count", 1234).unwrap();
    catalog.default_value_for("Book", "flag", true).unwrap();

    let object = Instance::builder(&book)
        .with_block(|x| {
            x.set("count", 1)?;
            x.set("flag", false)
        })
        .build(&catalog)
        .expect("instance");
    assert_eq!(object.get("count"), Value::Integer(1));
    assert_eq!(object.get("flag"), Value::Bool(false));
    // dirty tracking still compares values
    assert!(!object.is_changed());

    let untouched = new_book(&catalog, &book, &attributes! {});
    assert_eq!(untouched.get("count"), Value::Integer(1234));
    assert_eq!(untouched.get("flag"), Value::Bool(true));
}

#[test]
fn enforced_defaults_keep_input_equal_to_the_storage_default() {
    let (mut catalog, book) = setup(stored_defaults_schema());
    catalog
        .default_value_with("Book", "flag", DefaultOptions::new().value(true).allows_nil(false))
        .unwrap();
    catalog
        .default_value_with("Book", "count", DefaultOptions::new().value(1234).allows_nil(false))
        .unwrap();

    let object = new_book(&catalog, &book, &attributes! { "flag" => false, "count" => 1 });
    assert_eq!(object.get("flag"), Value::Bool(false));
    assert_eq!(object.get("count"), Value::Integer(1));

    let object = new_book(&catalog, &book, &attributes! {});
    assert_eq!(object.get("flag"), Value::Bool(true));
    assert_eq!(object.get("count"), Value::Integer(1234));
}

#[test]
fn doesnt_overwrite_explicitly_provided_nil() {
    let (mut catalog, book) = setup(book_schema());
    catalog.default_value_for("Book", "number", 1234).unwrap();
    let object = new_book(&catalog, &book, &attributes! { "number" => Value::Nil });
    assert_eq!(object.get("number"), Value::Nil);
}

#[test]
fn overwrites_explicitly_provided_nil_when_nil_is_disallowed() {
    let (mut catalog, book) = setup(book_schema());
    catalog
        .default_value_with("Book", "number", DefaultOptions::new().value(1234).allows_nil(false))
        .unwrap();
    let object = new_book(&catalog, &book, &attributes! { "number" => Value::Nil });
    assert_eq!(object.get("number"), Value::Integer(1234));
}

#[test]
fn explicit_false_is_kept_at_boolean_columns() {
    let (mut catalog, book) = setup(book_schema());
    catalog
        .default_value_with("Book", "flag", DefaultOptions::new().value(true).allows_nil(false))
        .unwrap();
    let object = new_book(&catalog, &book, &attributes! { "flag" => false });
    assert_eq!(object.get("flag"), Value::Bool(false));
    let object = new_book(&catalog, &book, &attributes! {});
    assert_eq!(object.get("flag"), Value::Bool(true));
}

#[test]
fn blank_text_is_defaulted_unless_provided() {
    let (mut catalog, book) = setup(book_schema());
    catalog.default_value_for("Book", "type", "normal").unwrap();
    let object = new_book(&catalog, &book, &attributes! { "type" => "   " });
    assert_eq!(object.get("type"), Value::from("   "));
    let object = Instance::builder(&book)
        .with_block(|x| x.set("type", ""))
        .build(&catalog)
        .expect("instance");
    assert_eq!(object.get("type"), Value::from("normal"));
}

#[test]
fn works_on_virtual_attributes() {
    let schema = book_schema().accessor(
        "color",
        |book: &Instance| {
            book.attributes()
                .get("stuff")
                .and_then(Value::as_map)
                .and_then(|stuff| stuff.get("color"))
                .cloned()
                .unwrap_or_default()
        },
        |book: &mut Instance, color: Value| {
            let mut stuff = book.get("stuff").as_map().cloned().unwrap_or_default();
            stuff.insert("color".to_string(), color);
            book.set("stuff", Value::Map(stuff))
        },
    );
    let (mut catalog, book) = setup(schema);
    catalog.default_value_for("Book", "color", "green").unwrap();
    let object = new_book(&catalog, &book, &attributes! {});
    assert_eq!(object.get("color"), Value::from("green"));
    assert_eq!(object.get("stuff"), Value::Map(attributes! { "color" => "green" }));
}

#[test]
fn works_on_attributes_that_arent_columns() {
    let (mut catalog, book) = setup(book_schema().slot("hello"));
    catalog.default_value_for("Book", "hello", "hi").unwrap();
    assert_eq!(new_book(&catalog, &book, &attributes! {}).get("hello"), Value::from("hi"));
}

#[test]
fn write_only_attributes_are_checked_through_their_slot() {
    let (mut catalog, book) = setup(book_schema().write_only_slot("secret"));
    catalog.default_value_for("Book", "secret", "s3cret").unwrap();
    let object = new_book(&catalog, &book, &attributes! {});
    assert_eq!(object.get("secret"), Value::from("s3cret"));
}

#[test]
fn defaulted_attributes_are_not_marked_as_changed() {
    let (mut catalog, book) = setup(book_schema());
    catalog.default_value_for("Book", "count", 5).unwrap();
    catalog.default_value_for("Book", "number", 2).unwrap();
    let mut object = new_book(&catalog, &book, &attributes! {});
    assert!(!object.is_changed());
    assert!(object.changed().is_empty());

    object.set("type", "foo").unwrap();
    assert!(object.is_changed());
    assert_eq!(object.changed(), vec!["type"]);
}

#[test]
fn static_defaults_are_duplicated() {
    let schema = Schema::new("User").column("username", ColumnType::String);
    let (mut catalog, user) = setup(schema);
    catalog.default_value_for("User", "username", "hello").unwrap();
    let mut first = Instance::new(&catalog, &user, &attributes! {}).unwrap();
    if let Some(Value::Text(name)) = first.attribute_mut("username") {
        name.push_str(" world");
    }
    let second = Instance::new(&catalog, &user, &attributes! {}).unwrap();
    assert_eq!(first.get("username"), Value::from("hello world"));
    assert_eq!(second.get("username"), Value::from("hello"));
}

#[test]
fn nested_containers_are_not_shared_between_records() {
    let schema = Schema::new("User").slot("hash");
    let (mut catalog, user) = setup(schema);
    catalog
        .default_value_for("User", "hash", attributes! { "1" => Value::List(vec![]) })
        .unwrap();
    let mut first = Instance::new(&catalog, &user, &attributes! {}).unwrap();
    if let Some(list) = first
        .attribute_mut("hash")
        .and_then(Value::as_map_mut)
        .and_then(|hash| hash.get_mut("1"))
        .and_then(Value::as_list_mut)
    {
        list.push(Value::Integer(1));
    }
    let second = Instance::new(&catalog, &user, &attributes! {}).unwrap();
    assert_eq!(first.get("hash"), Value::Map(attributes! { "1" => vec![1] }));
    assert_eq!(second.get("hash"), Value::Map(attributes! { "1" => Value::List(vec![]) }));
}

#[test]
fn constructor_does_not_affect_its_input() {
    let (mut catalog, book) = setup(book_schema());
    catalog.default_value_for("Book", "count", 5).unwrap();
    let options = attributes! { "count" => 5, "user_id" => 1 };
    let options_dup = options.clone();
    new_book(&catalog, &book, &options);
    assert_eq!(options, options_dup);
}

#[test]
fn protected_attributes_in_raw_input_are_not_defaulted() {
    let (mut catalog, book) = setup(book_schema().protect("number"));
    catalog.default_value_for("Book", "number", 1234).unwrap();
    let object = new_book(&catalog, &book, &attributes! { "number" => 5678, "count" => 987 });
    // the write was blocked, yet the attribute counts as provided
    assert_eq!(object.get("number"), Value::Nil);
    assert_eq!(object.get("count"), Value::Integer(987));
}

#[test]
fn protected_attributes_get_defaults_when_nil_is_disallowed() {
    let (mut catalog, book) = setup(book_schema().protect("number"));
    catalog
        .default_value_with("Book", "number", DefaultOptions::new().value(1234).allows_nil(false))
        .unwrap();
    let object = new_book(&catalog, &book, &attributes! { "number" => 5678 });
    assert_eq!(object.get("number"), Value::Integer(1234));
}

#[test]
fn constructor_respects_without_protection() {
    let (mut catalog, book) = setup(book_schema().protect("number"));
    catalog.default_value_for("Book", "number", 1234).unwrap();
    let input = attributes! { "number" => 5678, "count" => 987 };
    let object = Instance::builder(&book)
        .attributes(&input)
        .without_protection()
        .build(&catalog)
        .expect("instance");
    assert_eq!(object.get("number"), Value::Integer(5678));
    assert_eq!(object.get("count"), Value::Integer(987));
}

#[test]
fn custom_writability_predicate() {
    let schema = book_schema().writable_when(|_, name, _| name != "user_id");
    let (mut catalog, book) = setup(schema);
    catalog.default_value_for("Book", "user_id", 7).unwrap();
    catalog.default_value_for("Book", "number", 1).unwrap();
    let object = new_book(&catalog, &book, &attributes! { "user_id" => 99 });
    assert_eq!(object.get("user_id"), Value::Nil);
    assert_eq!(object.get("number"), Value::Integer(1));
}

#[test]
fn nested_attributes_count_as_provided() {
    let schema = Schema::new("User")
        .column("username", ColumnType::String)
        .accepts_nested_attributes_for("books");
    let (mut catalog, user) = setup(schema);
    catalog
        .default_value_by("User", "books", |_| {
            Ok(Value::List(vec![Value::Map(attributes! { "number" => 0 })]))
        })
        .unwrap();
    let provided = Value::List(vec![Value::Map(attributes! { "number" => 1 })]);
    let object = Instance::new(
        &catalog,
        &user,
        &attributes! { "books_attributes" => provided.clone() },
    )
    .unwrap();
    assert_eq!(object.get("books"), provided);

    let object = Instance::new(&catalog, &user, &attributes! {}).unwrap();
    assert_eq!(
        object.get("books"),
        Value::List(vec![Value::Map(attributes! { "number" => 0 })])
    );
}

#[test]
fn failing_function_propagates_its_error() {
    let (mut catalog, book) = setup(book_schema());
    catalog.default_value_for("Book", "number", 1).unwrap();
    catalog
        .default_value_by("Book", "count", |_| Err(DefaulterError::Callback("boom".to_string())))
        .unwrap();
    match Instance::new(&catalog, &book, &attributes! {}) {
        Err(DefaulterError::Callback(message)) => assert_eq!(message, "boom"),
        other => panic!("expected the callback error, got {:?}", other),
    }
}

#[test]
fn unknown_attribute_in_input_is_an_error() {
    let (catalog, book) = setup(book_schema());
    assert!(matches!(
        Instance::new(&catalog, &book, &attributes! { "nope" => 1 }),
        Err(DefaulterError::UnknownAttribute { .. })
    ));
}
