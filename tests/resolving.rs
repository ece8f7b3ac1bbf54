//! Reconciling writer and reader schemas: promotion, reordering, skipping,
//! default injection, enum and union remapping

use {
	avro_datum::{DatumConfig, ErrorKind, Schema, Value},
	pretty_assertions::assert_eq,
};

fn resolve(bytes: &[u8], writer: &str, reader: &str) -> Result<Value, avro_datum::Error> {
	let writer_schema: Schema = writer.parse().unwrap();
	let reader_schema: Schema = reader.parse().unwrap();
	avro_datum::resolve_datum_slice(bytes, &writer_schema, &reader_schema, &DatumConfig::new())
}

fn encode(value: &Value, schema: &str) -> Vec<u8> {
	let schema: Schema = schema.parse().unwrap();
	avro_datum::to_datum_vec(value, &schema, &DatumConfig::new()).unwrap()
}

#[test]
fn int_promotes_to_long() {
	// 300 zigzags to 0xD8 0x04
	let decoded = resolve(&[0xD8, 0x04], r#""int""#, r#""long""#).unwrap();
	assert_eq!(decoded, Value::Long(300));
}

#[test]
fn int_promotes_to_float_and_double() {
	let bytes = encode(&Value::Int(42), r#""int""#);
	assert_eq!(resolve(&bytes, r#""int""#, r#""float""#).unwrap(), Value::Float(42.0));
	assert_eq!(resolve(&bytes, r#""int""#, r#""double""#).unwrap(), Value::Double(42.0));
}

#[test]
fn long_and_float_promote() {
	let bytes = encode(&Value::Long(7), r#""long""#);
	assert_eq!(resolve(&bytes, r#""long""#, r#""float""#).unwrap(), Value::Float(7.0));
	assert_eq!(resolve(&bytes, r#""long""#, r#""double""#).unwrap(), Value::Double(7.0));

	let bytes = encode(&Value::Float(1.5), r#""float""#);
	assert_eq!(resolve(&bytes, r#""float""#, r#""double""#).unwrap(), Value::Double(1.5));
}

#[test]
fn string_and_bytes_are_interchangeable() {
	let bytes = encode(&Value::String("hi".to_owned()), r#""string""#);
	assert_eq!(
		resolve(&bytes, r#""string""#, r#""bytes""#).unwrap(),
		Value::Bytes(b"hi".to_vec())
	);
	let bytes = encode(&Value::Bytes(b"hi".to_vec()), r#""bytes""#);
	assert_eq!(
		resolve(&bytes, r#""bytes""#, r#""string""#).unwrap(),
		Value::String("hi".to_owned())
	);
}

#[test]
fn unpromotable_primitives_fail() {
	let bytes = encode(&Value::Long(1), r#""long""#);
	let err = resolve(&bytes, r#""long""#, r#""int""#).unwrap_err();
	assert_eq!(err.kind(), ErrorKind::TypeMismatch);
}

#[test]
fn fields_reorder_to_reader_declaration_order() {
	let writer = r#"{"type": "record", "name": "R", "fields": [
		{"name": "b", "type": "int"},
		{"name": "a", "type": "string"}
	]}"#;
	let reader = r#"{"type": "record", "name": "R", "fields": [
		{"name": "a", "type": "string"},
		{"name": "b", "type": "int"}
	]}"#;
	let datum = Value::Record(vec![
		("b".to_owned(), Value::Int(3)),
		("a".to_owned(), Value::String("x".to_owned())),
	]);
	let bytes = encode(&datum, writer);
	assert_eq!(
		resolve(&bytes, writer, reader).unwrap(),
		Value::Record(vec![
			("a".to_owned(), Value::String("x".to_owned())),
			("b".to_owned(), Value::Int(3)),
		])
	);
}

#[test]
fn writer_only_fields_are_skipped() {
	let writer = r#"{"type": "record", "name": "R", "fields": [
		{"name": "a", "type": "int"},
		{"name": "dropped", "type": {"type": "array", "items": "string"}},
		{"name": "b", "type": "long"}
	]}"#;
	let reader = r#"{"type": "record", "name": "R", "fields": [
		{"name": "a", "type": "int"},
		{"name": "b", "type": "long"}
	]}"#;
	let datum = Value::Record(vec![
		("a".to_owned(), Value::Int(1)),
		(
			"dropped".to_owned(),
			Value::Array(vec![Value::String("gone".to_owned())]),
		),
		("b".to_owned(), Value::Long(2)),
	]);
	let bytes = encode(&datum, writer);
	assert_eq!(
		resolve(&bytes, writer, reader).unwrap(),
		Value::Record(vec![
			("a".to_owned(), Value::Int(1)),
			("b".to_owned(), Value::Long(2)),
		])
	);
}

#[test]
fn trailing_writer_only_field_is_skipped() {
	let writer = r#"{"type": "record", "name": "R", "fields": [
		{"name": "a", "type": "int"},
		{"name": "trailing", "type": "string"}
	]}"#;
	let reader = r#"{"type": "record", "name": "R", "fields": [
		{"name": "a", "type": "int"}
	]}"#;
	let datum = Value::Record(vec![
		("a".to_owned(), Value::Int(1)),
		("trailing".to_owned(), Value::String("gone".to_owned())),
	]);
	let bytes = encode(&datum, writer);
	assert_eq!(
		resolve(&bytes, writer, reader).unwrap(),
		Value::Record(vec![("a".to_owned(), Value::Int(1))])
	);
}

#[test]
fn reader_defaults_are_injected() {
	// Adding defaulted fields to the reader does not change decoded values
	// for prior writers; the new fields equal their defaults
	let writer = r#"{"type": "record", "name": "R", "fields": [
		{"name": "a", "type": "int"}
	]}"#;
	let reader = r#"{"type": "record", "name": "R", "fields": [
		{"name": "a", "type": "int"},
		{"name": "b", "type": "int", "default": 7},
		{"name": "c", "type": "string", "default": "x"}
	]}"#;
	let bytes = encode(&Value::Record(vec![("a".to_owned(), Value::Int(1))]), writer);
	assert_eq!(
		resolve(&bytes, writer, reader).unwrap(),
		Value::Record(vec![
			("a".to_owned(), Value::Int(1)),
			("b".to_owned(), Value::Int(7)),
			("c".to_owned(), Value::String("x".to_owned())),
		])
	);
}

#[test]
fn union_default_takes_first_branch() {
	let writer = r#"{"type": "record", "name": "R", "fields": [
		{"name": "a", "type": "int"}
	]}"#;
	let reader = r#"{"type": "record", "name": "R", "fields": [
		{"name": "a", "type": "int"},
		{"name": "b", "type": ["null", "string"], "default": null}
	]}"#;
	let bytes = encode(&Value::Record(vec![("a".to_owned(), Value::Int(1))]), writer);
	assert_eq!(
		resolve(&bytes, writer, reader).unwrap(),
		Value::Record(vec![
			("a".to_owned(), Value::Int(1)),
			("b".to_owned(), Value::Union(0, Box::new(Value::Null))),
		])
	);
}

#[test]
fn missing_field_with_no_default_fails() {
	let writer = r#"{"type": "record", "name": "R", "fields": [
		{"name": "a", "type": "int"}
	]}"#;
	let reader = r#"{"type": "record", "name": "R", "fields": [
		{"name": "a", "type": "int"},
		{"name": "required", "type": "string"}
	]}"#;
	let bytes = encode(&Value::Record(vec![("a".to_owned(), Value::Int(1))]), writer);
	let err = resolve(&bytes, writer, reader).unwrap_err();
	assert_eq!(err.kind(), ErrorKind::MissingField);
}

#[test]
fn field_matches_through_reader_alias() {
	let writer = r#"{"type": "record", "name": "R", "fields": [
		{"name": "old_name", "type": "int"}
	]}"#;
	let reader = r#"{"type": "record", "name": "R", "fields": [
		{"name": "new_name", "type": "int", "aliases": ["old_name"]}
	]}"#;
	let bytes = encode(
		&Value::Record(vec![("old_name".to_owned(), Value::Int(5))]),
		writer,
	);
	assert_eq!(
		resolve(&bytes, writer, reader).unwrap(),
		Value::Record(vec![("new_name".to_owned(), Value::Int(5))])
	);
}

#[test]
fn record_matches_through_reader_alias() {
	let writer = r#"{"type": "record", "name": "Old", "fields": [
		{"name": "a", "type": "int"}
	]}"#;
	let reader = r#"{"type": "record", "name": "New", "aliases": ["Old"], "fields": [
		{"name": "a", "type": "int"}
	]}"#;
	let bytes = encode(&Value::Record(vec![("a".to_owned(), Value::Int(5))]), writer);
	assert_eq!(
		resolve(&bytes, writer, reader).unwrap(),
		Value::Record(vec![("a".to_owned(), Value::Int(5))])
	);
}

#[test]
fn enum_ordinals_remap_by_symbol() {
	let writer = r#"{"type": "enum", "name": "E", "symbols": ["A", "B", "C"]}"#;
	let reader = r#"{"type": "enum", "name": "E", "symbols": ["C", "A"]}"#;
	let bytes = encode(&Value::Enum(2, "C".to_owned()), writer);
	assert_eq!(
		resolve(&bytes, writer, reader).unwrap(),
		Value::Enum(0, "C".to_owned())
	);
}

#[test]
fn unknown_enum_symbol_falls_back_to_reader_default() {
	let writer = r#"{"type": "enum", "name": "E", "symbols": ["A", "B", "C"]}"#;
	let reader = r#"{"type": "enum", "name": "E", "symbols": ["A", "B"], "default": "A"}"#;
	let bytes = encode(&Value::Enum(2, "C".to_owned()), writer);
	assert_eq!(
		resolve(&bytes, writer, reader).unwrap(),
		Value::Enum(0, "A".to_owned())
	);
}

#[test]
fn unknown_enum_symbol_without_default_fails() {
	let writer = r#"{"type": "enum", "name": "E", "symbols": ["A", "B", "C"]}"#;
	let reader = r#"{"type": "enum", "name": "E", "symbols": ["A", "B"]}"#;
	let bytes = encode(&Value::Enum(2, "C".to_owned()), writer);
	let err = resolve(&bytes, writer, reader).unwrap_err();
	assert_eq!(err.kind(), ErrorKind::TypeMismatch);
}

#[test]
fn union_branches_remap() {
	let writer = r#"["int", "string"]"#;
	let reader = r#"["string", "long"]"#;

	let bytes = encode(&Value::Union(0, Box::new(Value::Int(5))), writer);
	assert_eq!(
		resolve(&bytes, writer, reader).unwrap(),
		Value::Union(1, Box::new(Value::Long(5)))
	);

	let bytes = encode(&Value::Union(1, Box::new(Value::String("s".to_owned()))), writer);
	assert_eq!(
		resolve(&bytes, writer, reader).unwrap(),
		Value::Union(0, Box::new(Value::String("s".to_owned())))
	);
}

#[test]
fn non_union_writer_resolves_into_reader_union() {
	let bytes = encode(&Value::Int(5), r#""int""#);
	assert_eq!(
		resolve(&bytes, r#""int""#, r#"["null", "long"]"#).unwrap(),
		Value::Union(1, Box::new(Value::Long(5)))
	);
}

#[test]
fn union_writer_resolves_into_non_union_reader() {
	let writer = r#"["null", "int"]"#;
	let bytes = encode(&Value::Union(1, Box::new(Value::Int(5))), writer);
	assert_eq!(resolve(&bytes, writer, r#""long""#).unwrap(), Value::Long(5));

	// The null branch cannot become a long; this only fails when taken
	let bytes = encode(&Value::Union(0, Box::new(Value::Null)), writer);
	let err = resolve(&bytes, writer, r#""long""#).unwrap_err();
	assert_eq!(err.kind(), ErrorKind::TypeMismatch);
}

#[test]
fn fixed_requires_matching_name_and_size() {
	let writer = r#"{"type": "fixed", "name": "F", "size": 2}"#;
	let bytes = encode(&Value::Fixed(vec![1, 2]), writer);

	assert_eq!(
		resolve(&bytes, writer, r#"{"type": "fixed", "name": "F", "size": 2}"#).unwrap(),
		Value::Fixed(vec![1, 2])
	);
	let err = resolve(&bytes, writer, r#"{"type": "fixed", "name": "F", "size": 3}"#).unwrap_err();
	assert_eq!(err.kind(), ErrorKind::TypeMismatch);
	let err = resolve(&bytes, writer, r#"{"type": "fixed", "name": "G", "size": 2}"#).unwrap_err();
	assert_eq!(err.kind(), ErrorKind::TypeMismatch);
}

#[test]
fn arrays_and_maps_resolve_their_items() {
	let bytes = encode(
		&Value::Array(vec![Value::Int(1), Value::Int(2)]),
		r#"{"type": "array", "items": "int"}"#,
	);
	assert_eq!(
		resolve(
			&bytes,
			r#"{"type": "array", "items": "int"}"#,
			r#"{"type": "array", "items": "long"}"#
		)
		.unwrap(),
		Value::Array(vec![Value::Long(1), Value::Long(2)])
	);

	let bytes = encode(
		&Value::Map([("k".to_owned(), Value::Int(1))].into_iter().collect()),
		r#"{"type": "map", "values": "int"}"#,
	);
	assert_eq!(
		resolve(
			&bytes,
			r#"{"type": "map", "values": "int"}"#,
			r#"{"type": "map", "values": "double"}"#
		)
		.unwrap(),
		Value::Map([("k".to_owned(), Value::Double(1.0))].into_iter().collect())
	);
}

#[test]
fn nested_records_resolve_fields_recursively() {
	let writer = r#"{"type": "record", "name": "Outer", "fields": [
		{"name": "inner", "type": {"type": "record", "name": "Inner", "fields": [
			{"name": "x", "type": "int"},
			{"name": "dropped", "type": "string"}
		]}},
		{"name": "tail", "type": "int"}
	]}"#;
	let reader = r#"{"type": "record", "name": "Outer", "fields": [
		{"name": "inner", "type": {"type": "record", "name": "Inner", "fields": [
			{"name": "x", "type": "long"},
			{"name": "added", "type": "int", "default": 9}
		]}},
		{"name": "tail", "type": "int"}
	]}"#;
	let datum = Value::Record(vec![
		(
			"inner".to_owned(),
			Value::Record(vec![
				("x".to_owned(), Value::Int(1)),
				("dropped".to_owned(), Value::String("bye".to_owned())),
			]),
		),
		("tail".to_owned(), Value::Int(2)),
	]);
	let bytes = encode(&datum, writer);
	assert_eq!(
		resolve(&bytes, writer, reader).unwrap(),
		Value::Record(vec![
			(
				"inner".to_owned(),
				Value::Record(vec![
					("x".to_owned(), Value::Long(1)),
					("added".to_owned(), Value::Int(9)),
				]),
			),
			("tail".to_owned(), Value::Int(2)),
		])
	);
}

#[test]
fn arrays_of_records_skip_trailing_fields_between_items() {
	let writer = r#"{"type": "array", "items": {"type": "record", "name": "R", "fields": [
		{"name": "keep", "type": "int"},
		{"name": "drop", "type": "string"}
	]}}"#;
	let reader = r#"{"type": "array", "items": {"type": "record", "name": "R", "fields": [
		{"name": "keep", "type": "int"}
	]}}"#;
	let datum = Value::Array(vec![
		Value::Record(vec![
			("keep".to_owned(), Value::Int(1)),
			("drop".to_owned(), Value::String("a".to_owned())),
		]),
		Value::Record(vec![
			("keep".to_owned(), Value::Int(2)),
			("drop".to_owned(), Value::String("b".to_owned())),
		]),
	]);
	let bytes = encode(&datum, writer);
	assert_eq!(
		resolve(&bytes, writer, reader).unwrap(),
		Value::Array(vec![
			Value::Record(vec![("keep".to_owned(), Value::Int(1))]),
			Value::Record(vec![("keep".to_owned(), Value::Int(2))]),
		])
	);
}

#[test]
fn self_referential_schemas_resolve() {
	let schema = r#"{"type": "record", "name": "Node", "fields": [
		{"name": "value", "type": "int"},
		{"name": "next", "type": ["null", "Node"]}
	]}"#;
	let datum = Value::Record(vec![
		("value".to_owned(), Value::Int(1)),
		(
			"next".to_owned(),
			Value::Union(
				1,
				Box::new(Value::Record(vec![
					("value".to_owned(), Value::Int(2)),
					("next".to_owned(), Value::Union(0, Box::new(Value::Null))),
				])),
			),
		),
	]);
	let bytes = encode(&datum, schema);
	// Force the resolving path even though the schemas are identical
	let parsed: Schema = schema.parse().unwrap();
	let resolution = avro_datum::de::Resolution::new(&parsed, &parsed).unwrap();
	let mut decoder = avro_datum::de::ResolvingDecoder::new(
		&resolution,
		avro_datum::de::read::SliceRead::new(&bytes),
	);
	let decoded = avro_datum::de::DatumReader::new(&parsed, &DatumConfig::new())
		.read(&mut decoder)
		.unwrap();
	assert_eq!(decoded, datum);
}
