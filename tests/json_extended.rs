//! The extended JSON codec: field-order independence, default injection,
//! strict/lenient unknown-field handling, union tagging, byte spellings

use {
	avro_datum::{DatumConfig, ErrorKind, JsonMode, Schema, Value},
	pretty_assertions::assert_eq,
};

fn decode(json: &str, schema: &str, mode: JsonMode) -> Result<Value, avro_datum::Error> {
	let schema: Schema = schema.parse().unwrap();
	avro_datum::from_json_str(json, &schema, &DatumConfig::new(), mode)
}

fn encode(value: &Value, schema: &str) -> String {
	let schema: Schema = schema.parse().unwrap();
	avro_datum::to_json_string(value, &schema, &DatumConfig::new()).unwrap()
}

const REORDER_SCHEMA: &str = r#"{"type": "record", "name": "R", "fields": [
	{"name": "a", "type": "int"},
	{"name": "b", "type": "int", "default": 7},
	{"name": "c", "type": "string"}
]}"#;

#[test]
fn fields_decode_in_any_order_and_defaults_fill_in() {
	let decoded = decode(r#"{"c": "x", "a": 1}"#, REORDER_SCHEMA, JsonMode::Strict).unwrap();
	assert_eq!(
		decoded,
		Value::Record(vec![
			("a".to_owned(), Value::Int(1)),
			("b".to_owned(), Value::Int(7)),
			("c".to_owned(), Value::String("x".to_owned())),
		])
	);
}

#[test]
fn field_order_does_not_change_the_decoded_value() {
	let expected = decode(
		r#"{"a": 1, "b": 2, "c": "x"}"#,
		REORDER_SCHEMA,
		JsonMode::Strict,
	)
	.unwrap();
	for permutation in [
		r#"{"a": 1, "c": "x", "b": 2}"#,
		r#"{"b": 2, "a": 1, "c": "x"}"#,
		r#"{"b": 2, "c": "x", "a": 1}"#,
		r#"{"c": "x", "a": 1, "b": 2}"#,
		r#"{"c": "x", "b": 2, "a": 1}"#,
	] {
		for mode in [JsonMode::Strict, JsonMode::Lenient] {
			assert_eq!(decode(permutation, REORDER_SCHEMA, mode).unwrap(), expected);
		}
	}
}

#[test]
fn missing_field_without_default_fails() {
	let err = decode(r#"{"a": 1, "b": 2}"#, REORDER_SCHEMA, JsonMode::Strict).unwrap_err();
	assert_eq!(err.kind(), ErrorKind::MissingField);
}

#[test]
fn unknown_fields_fail_strict_and_pass_lenient() {
	let schema = r#"{"type": "record", "name": "R", "fields": [
		{"name": "a", "type": "int"}
	]}"#;
	let err = decode(r#"{"a": 1, "b": 2}"#, schema, JsonMode::Strict).unwrap_err();
	assert_eq!(err.kind(), ErrorKind::UnknownField);
	assert_eq!(
		decode(r#"{"a": 1, "b": 2}"#, schema, JsonMode::Lenient).unwrap(),
		Value::Record(vec![("a".to_owned(), Value::Int(1))])
	);
}

#[test]
fn unknown_field_before_known_ones_is_buffered_then_rejected() {
	let schema = r#"{"type": "record", "name": "R", "fields": [
		{"name": "a", "type": "int"}
	]}"#;
	let err = decode(r#"{"b": {"deep": [1, 2]}, "a": 1}"#, schema, JsonMode::Strict).unwrap_err();
	assert_eq!(err.kind(), ErrorKind::UnknownField);
	assert_eq!(
		decode(r#"{"b": {"deep": [1, 2]}, "a": 1}"#, schema, JsonMode::Lenient).unwrap(),
		Value::Record(vec![("a".to_owned(), Value::Int(1))])
	);
}

#[test]
fn writer_emits_declaration_order() {
	let json = encode(
		&Value::Record(vec![
			("a".to_owned(), Value::Int(1)),
			("b".to_owned(), Value::Int(2)),
			("c".to_owned(), Value::String("x".to_owned())),
		]),
		REORDER_SCHEMA,
	);
	assert_eq!(json, r#"{"a":1,"b":2,"c":"x"}"#);
}

#[test]
fn nullable_union_with_single_non_null_branch_is_unwrapped() {
	let schema = r#"["null", {"type": "record", "name": "Foo", "fields": [
		{"name": "x", "type": "int"}
	]}]"#;

	let present = Value::Union(
		1,
		Box::new(Value::Record(vec![("x".to_owned(), Value::Int(1))])),
	);
	assert_eq!(encode(&present, schema), r#"{"x":1}"#);
	assert_eq!(decode(r#"{"x": 1}"#, schema, JsonMode::Strict).unwrap(), present);

	let absent = Value::Union(0, Box::new(Value::Null));
	assert_eq!(encode(&absent, schema), "null");
	assert_eq!(decode("null", schema, JsonMode::Strict).unwrap(), absent);
}

#[test]
fn multi_branch_unions_use_tag_objects() {
	let schema = r#"["null", "string", "int"]"#;

	let s = Value::Union(1, Box::new(Value::String("x".to_owned())));
	assert_eq!(encode(&s, schema), r#"{"string":"x"}"#);
	assert_eq!(decode(r#"{"string": "x"}"#, schema, JsonMode::Strict).unwrap(), s);

	let i = Value::Union(2, Box::new(Value::Int(3)));
	assert_eq!(encode(&i, schema), r#"{"int":3}"#);
	assert_eq!(decode(r#"{"int": 3}"#, schema, JsonMode::Strict).unwrap(), i);

	let n = Value::Union(0, Box::new(Value::Null));
	assert_eq!(encode(&n, schema), "null");
	assert_eq!(decode("null", schema, JsonMode::Strict).unwrap(), n);
}

#[test]
fn named_branch_tags_accept_simple_names() {
	let schema = r#"["string", {"type": "record", "name": "ns.Foo", "fields": [
		{"name": "x", "type": "int"}
	]}]"#;
	let expected = Value::Union(
		1,
		Box::new(Value::Record(vec![("x".to_owned(), Value::Int(1))])),
	);
	assert_eq!(
		decode(r#"{"ns.Foo": {"x": 1}}"#, schema, JsonMode::Strict).unwrap(),
		expected
	);
	assert_eq!(
		decode(r#"{"Foo": {"x": 1}}"#, schema, JsonMode::Strict).unwrap(),
		expected
	);
}

#[test]
fn unknown_union_tag_fails() {
	let schema = r#"["null", "string", "int"]"#;
	let err = decode(r#"{"double": 1.5}"#, schema, JsonMode::Strict).unwrap_err();
	assert_eq!(err.kind(), ErrorKind::UnionBranch);
}

#[test]
fn bytes_accept_string_integer_and_decimal_spellings() {
	let schema = r#""bytes""#;

	// ISO-8859-1 string: one char per byte
	assert_eq!(
		decode("\"\\u0001\\u00ff\"", schema, JsonMode::Strict).unwrap(),
		Value::Bytes(vec![0x01, 0xFF])
	);
	// Integer: two's-complement big-endian
	assert_eq!(
		decode("12345", schema, JsonMode::Strict).unwrap(),
		Value::Bytes(vec![0x30, 0x39])
	);
	// Decimal number: two's-complement of the unscaled value
	assert_eq!(
		decode("123.45", schema, JsonMode::Strict).unwrap(),
		Value::Bytes(vec![0x30, 0x39])
	);
}

#[test]
fn bytes_round_trip_through_iso_8859_1() {
	let schema = r#""bytes""#;
	let value = Value::Bytes(vec![0, 1, 127, 128, 255]);
	let json = encode(&value, schema);
	assert_eq!(decode(&json, schema, JsonMode::Strict).unwrap(), value);
}

#[test]
fn enums_are_quoted_symbols() {
	let schema = r#"{"type": "enum", "name": "E", "symbols": ["A", "B"]}"#;
	assert_eq!(encode(&Value::Enum(1, "B".to_owned()), schema), r#""B""#);
	assert_eq!(
		decode(r#""B""#, schema, JsonMode::Strict).unwrap(),
		Value::Enum(1, "B".to_owned())
	);
}

#[test]
fn maps_and_arrays_nest() {
	let schema = r#"{"type": "map", "values": {"type": "array", "items": "int"}}"#;
	let value = Value::Map(
		[(
			"k".to_owned(),
			Value::Array(vec![Value::Int(1), Value::Int(2)]),
		)]
		.into_iter()
		.collect(),
	);
	let json = encode(&value, schema);
	assert_eq!(decode(&json, schema, JsonMode::Strict).unwrap(), value);
}

#[test]
fn nested_records_reorder_independently() {
	let schema = r#"{"type": "record", "name": "Outer", "fields": [
		{"name": "inner", "type": {"type": "record", "name": "Inner", "fields": [
			{"name": "x", "type": "int"},
			{"name": "y", "type": "int"}
		]}},
		{"name": "tail", "type": "int"}
	]}"#;
	let expected = Value::Record(vec![
		(
			"inner".to_owned(),
			Value::Record(vec![
				("x".to_owned(), Value::Int(1)),
				("y".to_owned(), Value::Int(2)),
			]),
		),
		("tail".to_owned(), Value::Int(3)),
	]);
	assert_eq!(
		decode(
			r#"{"tail": 3, "inner": {"y": 2, "x": 1}}"#,
			schema,
			JsonMode::Strict
		)
		.unwrap(),
		expected
	);
}

#[test]
fn deeply_nested_unread_field_hits_the_capture_limit() {
	let schema = r#"{"type": "record", "name": "R", "fields": [
		{"name": "a", "type": "int"}
	]}"#;
	// 9 levels of nesting in a field that has to be buffered while seeking
	// `a` exceeds the capture depth bound
	let json = r#"{"z": [[[[[[[[[1]]]]]]]]], "a": 1}"#;
	let err = decode(json, schema, JsonMode::Lenient).unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Capacity);
}

#[test]
fn fixed_round_trips_as_string() {
	let schema = r#"{"type": "fixed", "name": "F", "size": 3}"#;
	let value = Value::Fixed(vec![1, 2, 3]);
	let json = encode(&value, schema);
	assert_eq!(decode(&json, schema, JsonMode::Strict).unwrap(), value);
}

#[test]
fn wrong_scalar_type_fails() {
	let err = decode(r#""not a number""#, r#""int""#, JsonMode::Strict).unwrap_err();
	assert_eq!(err.kind(), ErrorKind::TypeMismatch);
}
