//! End-to-end behavior of versioned schemas: version selection, round trips,
//! nested and polymorphic fields, deferred targets and accessors.

use drover_serialization::fields::{Int, Str};
use drover_serialization::{
    Constructor, Context, Field, FieldValue, LoadOptions, Nested, OneOf, Record, Schema,
    SchemaError, SchemaObject, ValidationError, VersionRegistry, VERSION_FIELD,
};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq)]
struct Point {
    x: i64,
    y: Option<i64>,
    /// Tag of the schema generation that built this object.
    loaded_by: &'static str,
}

impl SchemaObject for Point {
    fn attribute(&self, name: &str) -> Option<FieldValue> {
        match name {
            "x" => Some(self.x.into()),
            "y" => Some(FieldValue::optional(self.y, FieldValue::from)),
            _ => None,
        }
    }
}

fn int(record: &Record, name: &str) -> Option<i64> {
    record.get(name).and_then(FieldValue::as_i64)
}

fn point_v1(r: Record) -> Result<Box<dyn SchemaObject>, ValidationError> {
    Ok(Box::new(Point {
        x: int(&r, "x").unwrap_or_default(),
        y: None,
        loaded_by: "1",
    }))
}

fn point_v2(r: Record) -> Result<Box<dyn SchemaObject>, ValidationError> {
    Ok(Box::new(Point {
        x: int(&r, "x").unwrap_or_default(),
        y: int(&r, "y"),
        loaded_by: "2",
    }))
}

fn point_v4(r: Record) -> Result<Box<dyn SchemaObject>, ValidationError> {
    Ok(Box::new(Point {
        x: int(&r, "x").unwrap_or_default(),
        y: int(&r, "y"),
        loaded_by: "4",
    }))
}

fn point_registry() -> VersionRegistry {
    let mut registry = VersionRegistry::new();
    registry.register(
        Schema::builder("Point", "1")
            .field(Field::new("x", Int).required())
            .construct(point_v1)
            .build(),
    );
    for (tag, constructor) in [("2", point_v2 as Constructor), ("4", point_v4)] {
        registry.register(
            Schema::builder("Point", tag)
                .field(Field::new("x", Int).required())
                .field(Field::new("y", Int).allow_none())
                .construct(constructor)
                .build(),
        );
    }
    registry
}

fn loaded_by(registry: &VersionRegistry, payload: Value) -> &'static str {
    registry
        .schema("Point")
        .unwrap()
        .load(&payload)
        .unwrap()
        .into_object::<Point>()
        .unwrap()
        .loaded_by
}

#[test]
fn payload_version_selects_the_greatest_tag_at_or_below() {
    let registry = point_registry();
    assert_eq!(loaded_by(&registry, json!({"x": 1, "__version__": "1"})), "1");
    assert_eq!(loaded_by(&registry, json!({"x": 1, "__version__": "3"})), "2");
    assert_eq!(loaded_by(&registry, json!({"x": 1, "__version__": "5"})), "4");
    assert_eq!(loaded_by(&registry, json!({"x": 1})), "4");
}

#[test]
fn payload_older_than_every_tag_fails() {
    let registry = point_registry();
    let err = registry
        .schema("Point")
        .unwrap()
        .load(&json!({"x": 1, "__version__": "0"}))
        .unwrap_err();
    assert!(matches!(err, SchemaError::NoMatchingVersion { .. }));
}

#[test]
fn older_generation_rejects_fields_it_never_had() {
    let registry = point_registry();
    let err = registry
        .schema("Point")
        .unwrap()
        .load(&json!({"x": 1, "y": 2, "__version__": "1"}))
        .unwrap_err();
    match err {
        SchemaError::Validation(e) => assert_eq!(e.messages("y"), ["Unknown field."]),
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn dump_stamps_the_definition_tag_and_round_trips() {
    let registry = point_registry();
    let schema = registry.schema("Point").unwrap();
    let point = Point {
        x: 3,
        y: None,
        loaded_by: "4",
    };

    let payload = schema.dump(&point).unwrap();
    assert_eq!(
        Value::Object(payload.clone()),
        json!({"x": 3, "y": null, "__version__": "4"})
    );

    let back = schema
        .load(&Value::Object(payload.clone()))
        .unwrap()
        .into_object::<Point>()
        .unwrap();
    assert_eq!(back, point);

    // Dumping what was loaded reproduces the same payload.
    assert_eq!(schema.dump(&back).unwrap(), payload);
}

#[test]
fn load_without_object_returns_the_record() {
    let registry = point_registry();
    let record = registry
        .schema("Point")
        .unwrap()
        .load_with(
            &json!({"x": 1, "y": null}),
            LoadOptions {
                create_object: false,
                check_version: true,
            },
        )
        .unwrap()
        .into_record()
        .unwrap();
    assert_eq!(int(&record, "x"), Some(1));
    assert!(record["y"].is_null());
    assert!(!record.contains_key(VERSION_FIELD));
}

#[test]
fn missing_and_null_fields_are_reported_together() {
    let mut registry = VersionRegistry::new();
    registry.register(
        Schema::builder("Pair", "1")
            .field(Field::new("left", Str).required())
            .field(Field::new("right", Str))
            .build(),
    );
    let err = registry
        .schema("Pair")
        .unwrap()
        .load(&json!({"right": null}))
        .unwrap_err();
    match err {
        SchemaError::Validation(e) => {
            assert_eq!(e.messages("left"), ["Missing data for required field."]);
            assert_eq!(e.messages("right"), ["Field may not be null."]);
        }
        other => panic!("unexpected error: {}", other),
    }
}

// ── Nested, deferred and accessor fields ─────────────────────────────

#[derive(Debug)]
struct Segment {
    start: Point,
    label: String,
}

impl SchemaObject for Segment {
    fn attribute(&self, name: &str) -> Option<FieldValue> {
        match name {
            "start" => Some(FieldValue::object(self.start.clone())),
            "label" => Some(self.label.clone().into()),
            _ => None,
        }
    }
}

fn build_segment(mut r: Record) -> Result<Box<dyn SchemaObject>, ValidationError> {
    let start = r
        .remove("start")
        .and_then(|v| v.downcast_ref::<Point>().cloned())
        .ok_or_else(|| ValidationError::field("start", "Not a point."))?;
    let label = r
        .get("label")
        .and_then(FieldValue::as_str)
        .unwrap_or_default()
        .to_string();
    Ok(Box::new(Segment { start, label }))
}

fn segment_constructor() -> Constructor {
    build_segment
}

fn origin_from_context(_: &dyn SchemaObject, context: &Context) -> Option<FieldValue> {
    let x = context.get("origin_x").and_then(Value::as_i64)?;
    Some(FieldValue::object(Point {
        x,
        y: None,
        loaded_by: "4",
    }))
}

fn segment_registry() -> VersionRegistry {
    let mut registry = point_registry();
    registry.register(
        Schema::builder("Segment", "1")
            .field(Field::new("start", Nested::new("Point")).required())
            .field(Field::new("label", Str))
            .construct_deferred(segment_constructor)
            .build(),
    );
    registry
}

#[test]
fn nested_payload_resolves_its_own_version() {
    let registry = segment_registry();
    let segment = registry
        .schema("Segment")
        .unwrap()
        .load(&json!({
            "start": {"x": 1, "__version__": "1"},
            "label": "a",
            "__version__": "1"
        }))
        .unwrap()
        .into_object::<Segment>()
        .unwrap();
    assert_eq!(segment.start.loaded_by, "1");
    assert_eq!(segment.label, "a");
}

#[test]
fn nested_errors_carry_the_field_path() {
    let registry = segment_registry();
    let err = registry
        .schema("Segment")
        .unwrap()
        .load(&json!({"start": {"x": "one"}}))
        .unwrap_err();
    match err {
        SchemaError::Validation(e) => {
            assert_eq!(e.messages("start.x"), ["Not a valid integer."]);
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn accessor_reads_context_and_omits_when_absent() {
    let mut registry = segment_registry();
    registry.register(
        Schema::builder("Anchored", "1")
            .field(Field::new("x", Int))
            .field(Field::new(
                "origin",
                Nested::new("Point").with_accessor(origin_from_context),
            ))
            .build(),
    );
    let mut record = Record::new();
    record.insert("x".into(), 1.into());

    let plain = registry.schema("Anchored").unwrap().dump(&record).unwrap();
    assert!(!plain.contains_key("origin"));
    assert_eq!(plain["x"], json!(1));

    let mut context = Context::new();
    context.insert("origin_x".into(), json!(9));
    let anchored = registry
        .schema("Anchored")
        .unwrap()
        .with_context(context)
        .dump(&record)
        .unwrap();
    assert_eq!(
        anchored["origin"],
        json!({"x": 9, "y": null, "__version__": "4"})
    );
}

#[test]
fn nested_dump_embeds_the_child_version() {
    let registry = segment_registry();
    let segment = Segment {
        start: Point {
            x: 2,
            y: Some(5),
            loaded_by: "4",
        },
        label: "b".into(),
    };
    let payload = registry.schema("Segment").unwrap().dump(&segment).unwrap();
    assert_eq!(
        Value::Object(payload),
        json!({
            "start": {"x": 2, "y": 5, "__version__": "4"},
            "label": "b",
            "__version__": "1"
        })
    );
}

// ── Polymorphic fields ───────────────────────────────────────────────

#[derive(Debug)]
struct Shape {
    kind: &'static str,
    x: i64,
}

impl SchemaObject for Shape {
    fn attribute(&self, name: &str) -> Option<FieldValue> {
        match name {
            "type" => Some(self.kind.into()),
            "x" => Some(self.x.into()),
            _ => None,
        }
    }
}

fn shapes() -> OneOf {
    OneOf::new()
        .variant("point", "Point")
        .variant("segment", "Segment")
}

#[test]
fn one_of_dumps_the_discriminator_and_dispatches_on_load() {
    let registry = segment_registry();
    let context = Context::new();

    let payload = shapes()
        .dump(&Shape { kind: "point", x: 7 }, &registry, &context)
        .unwrap();
    assert_eq!(payload["type"], json!("point"));
    assert_eq!(payload[VERSION_FIELD], json!("4"));

    let loaded = shapes()
        .load(
            &Value::Object(payload),
            &registry,
            LoadOptions::default(),
            &context,
        )
        .unwrap()
        .into_object::<Point>()
        .unwrap();
    assert_eq!(loaded.x, 7);
}

#[test]
fn one_of_rejects_unknown_discriminators() {
    let registry = segment_registry();
    let context = Context::new();

    let err = shapes()
        .dump(&Shape { kind: "circle", x: 1 }, &registry, &context)
        .unwrap_err();
    assert!(err.to_string().contains("Unsupported object type: circle"));

    let err = shapes()
        .load(
            &json!({"type": "circle", "x": 1}),
            &registry,
            LoadOptions::default(),
            &context,
        )
        .unwrap_err();
    assert!(err.to_string().contains("Unsupported value: circle"));

    let err = shapes()
        .load(&json!({"x": 1}), &registry, LoadOptions::default(), &context)
        .unwrap_err();
    match err {
        SchemaError::Validation(e) => {
            assert_eq!(e.messages("type"), ["Missing data for required field."]);
        }
        other => panic!("unexpected error: {}", other),
    }
}
