//! Schema parsing, validation, fingerprinting and re-serialization

use {
	avro_datum::{
		schema::{self, SchemaMut, SchemaType},
		ErrorKind, Schema,
	},
	pretty_assertions::assert_eq,
};

#[test]
fn parses_nested_record() {
	let schema: Schema = r#"{
		"type": "record",
		"namespace": "test",
		"name": "Outer",
		"fields": [
			{"name": "inner", "type": {"type": "record", "name": "Inner", "fields": [
				{"name": "x", "type": "int"}
			]}}
		]
	}"#
	.parse()
	.unwrap();
	let SchemaType::Record(outer) = &schema.root().type_ else {
		panic!("expected a record");
	};
	assert_eq!(outer.name.fully_qualified_name(), "test.Outer");
	assert_eq!(outer.name.namespace(), Some("test"));
	assert_eq!(outer.fields.len(), 1);
	let SchemaType::Record(inner) = &schema[outer.fields[0].type_].type_ else {
		panic!("expected a record");
	};
	// The namespace is inherited by nested named types
	assert_eq!(inner.name.fully_qualified_name(), "test.Inner");
}

#[test]
fn named_types_are_referenced_by_name() {
	let schema: Schema = r#"{
		"type": "record",
		"name": "Node",
		"fields": [
			{"name": "value", "type": "int"},
			{"name": "next", "type": ["null", "Node"]}
		]
	}"#
	.parse()
	.unwrap();
	let SchemaType::Record(record) = &schema.root().type_ else {
		panic!("expected a record");
	};
	let SchemaType::Union(union) = &schema[record.fields[1].type_].type_ else {
		panic!("expected a union");
	};
	// The `Node` reference points back at the root node
	assert_eq!(union.variants[1], avro_datum::schema::SchemaKey::root());
}

#[test]
fn forward_references_resolve() {
	let schema: Schema = r#"{
		"type": "record",
		"name": "R",
		"fields": [
			{"name": "a", "type": "Later"},
			{"name": "def", "type": {"type": "fixed", "name": "Later", "size": 4}}
		]
	}"#
	.parse()
	.unwrap();
	let SchemaType::Record(record) = &schema.root().type_ else {
		panic!("expected a record");
	};
	assert!(matches!(
		&schema[record.fields[0].type_].type_,
		SchemaType::Fixed(fixed) if fixed.size == 4
	));
}

#[test]
fn unknown_reference_fails() {
	let err = r#"{
		"type": "record",
		"name": "R",
		"fields": [{"name": "a", "type": "Nowhere"}]
	}"#
	.parse::<Schema>()
	.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::UnresolvedSchema);
}

#[test]
fn duplicate_names_fail() {
	let err = r#"[
		{"type": "fixed", "name": "F", "size": 1},
		{"type": "fixed", "name": "F", "size": 2}
	]"#
	.parse::<Schema>()
	.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::UnresolvedSchema);
}

#[test]
fn union_may_not_contain_duplicate_unnamed_types() {
	let err = r#"["int", "string", "int"]"#.parse::<Schema>().unwrap_err();
	assert_eq!(err.kind(), ErrorKind::UnresolvedSchema);
	// Distinct named types of the same kind are fine
	r#"[{"type": "fixed", "name": "A", "size": 1}, {"type": "fixed", "name": "B", "size": 1}]"#
		.parse::<Schema>()
		.unwrap();
}

#[test]
fn immediately_nested_union_fails() {
	let err = r#"["int", ["string", "long"]]"#.parse::<Schema>().unwrap_err();
	assert_eq!(err.kind(), ErrorKind::UnresolvedSchema);
}

#[test]
fn unconditional_cycle_fails() {
	let err = r#"{
		"type": "record",
		"name": "Ouroboros",
		"fields": [{"name": "tail", "type": "Ouroboros"}]
	}"#
	.parse::<Schema>()
	.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::UnresolvedSchema);
}

#[test]
fn incompatible_default_fails() {
	let err = r#"{
		"type": "record",
		"name": "R",
		"fields": [{"name": "a", "type": "int", "default": "not a number"}]
	}"#
	.parse::<Schema>()
	.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::UnresolvedSchema);
}

#[test]
fn error_type_parses_as_error_record() {
	let schema: Schema = r#"{
		"type": "error",
		"name": "Oops",
		"fields": [{"name": "message", "type": "string"}]
	}"#
	.parse()
	.unwrap();
	let SchemaType::Record(record) = &schema.root().type_ else {
		panic!("expected a record");
	};
	assert!(record.is_error);
}

#[test]
fn open_properties_are_preserved() {
	let schema: Schema = r#"{
		"type": "string",
		"logicalType": "instant",
		"format": "%Y-%m-%d",
		"doc": "free-form"
	}"#
	.parse()
	.unwrap();
	let node = schema.root();
	assert_eq!(
		node.properties.get("format"),
		Some(&serde_json::Value::String("%Y-%m-%d".to_owned()))
	);
	assert_eq!(
		node.properties.get("doc"),
		Some(&serde_json::Value::String("free-form".to_owned()))
	);
	assert_eq!(node.logical_type.as_ref().map(|l| l.as_str()), Some("instant"));
}

#[test]
fn field_order_and_aliases_parse() {
	let schema: Schema = r#"{
		"type": "record",
		"name": "R",
		"fields": [
			{"name": "a", "type": "int", "order": "descending", "aliases": ["b"]}
		]
	}"#
	.parse()
	.unwrap();
	let SchemaType::Record(record) = &schema.root().type_ else {
		panic!("expected a record");
	};
	assert_eq!(record.fields[0].order, schema::FieldOrder::Descending);
	assert_eq!(record.fields[0].aliases, vec!["b".to_owned()]);
	assert_eq!(record.fields[0].position, 0);
}

#[test]
fn fingerprint_matches_reference_values() {
	// Reference values computed by the Java SchemaNormalization
	// implementation over the parsing canonical form
	let cases: &[(&str, i64)] = &[
		(r#""null""#, 7195948357588979594),
		(r#""boolean""#, -6970731678124411036),
		(r#"{"type":"fixed","name":"foo","size":15}"#, 1756455273707447556),
		(
			r#"{"name":"PigValue","type":"record","fields":[{"name":"value","type":["null","int","long","PigValue"]}]}"#,
			-1759257747318642341,
		),
	];
	for (json, expected) in cases {
		let schema: Schema = json.parse().unwrap();
		assert_eq!(
			i64::from_le_bytes(*schema.rabin_fingerprint()),
			*expected,
			"fingerprint mismatch for {json}"
		);
	}
}

#[test]
fn fingerprint_ignores_logical_types_and_properties() {
	let plain: Schema = r#""int""#.parse().unwrap();
	let annotated: Schema = r#"{"type": "int", "logicalType": "date", "custom": 1}"#
		.parse()
		.unwrap();
	assert_eq!(plain.rabin_fingerprint(), annotated.rabin_fingerprint());
}

#[test]
fn json_is_minified_and_preserved() {
	let schema: Schema = r#"{ "type" : "record", "name": "R",
		"fields": [ {"name": "a", "type": "int"} ] }"#
		.parse()
		.unwrap();
	assert_eq!(
		schema.json(),
		r#"{"type":"record","name":"R","fields":[{"name":"a","type":"int"}]}"#
	);
}

#[test]
fn manually_built_schemas_serialize_back_to_json() {
	let mut editable: SchemaMut = r#"{
		"type": "record",
		"name": "R",
		"fields": [{"name": "a", "type": "int", "default": 3}]
	}"#
	.parse()
	.unwrap();
	// Editing drops the original JSON, so it gets re-generated
	editable.nodes_mut();
	let schema = editable.freeze().unwrap();
	let regenerated: Schema = schema.json().parse().unwrap();
	assert_eq!(schema.rabin_fingerprint(), regenerated.rabin_fingerprint());
	let SchemaType::Record(record) = &regenerated.root().type_ else {
		panic!("expected a record");
	};
	assert_eq!(record.fields[0].default, Some(serde_json::Value::Number(3.into())));
}

#[test]
fn nested_type_objects_unwrap() {
	let schema: Schema = r#"{"type": {"type": "string"}}"#.parse().unwrap();
	assert!(matches!(schema.root().type_, SchemaType::String));
}
