//! Binary round-trips over a zoo of schemas

use {
	avro_datum::{DatumConfig, Schema, Value},
	lazy_static::lazy_static,
	pretty_assertions::assert_eq,
};

lazy_static! {
	static ref SCHEMAS_TO_VALIDATE: Vec<(&'static str, Value)> = vec![
		(r#""null""#, Value::Null),
		(r#""boolean""#, Value::Boolean(true)),
		(
			r#""string""#,
			Value::String("adsfasdf09809dsf-=adsf".to_string())
		),
		(
			r#""bytes""#,
			Value::Bytes("12345abcd".to_string().into_bytes())
		),
		(r#""int""#, Value::Int(1234)),
		(r#""long""#, Value::Long(1234)),
		(r#""float""#, Value::Float(1234.0)),
		(r#""double""#, Value::Double(1234.0)),
		(
			r#"{"type": "fixed", "name": "Test", "size": 1}"#,
			Value::Fixed(vec![b'B'])
		),
		(
			r#"{"type": "enum", "name": "Test", "symbols": ["A", "B"]}"#,
			Value::Enum(1, "B".to_string())
		),
		(
			r#"{"type": "array", "items": "long"}"#,
			Value::Array(vec![Value::Long(1), Value::Long(3), Value::Long(2)])
		),
		(
			r#"{"type": "map", "values": "long"}"#,
			Value::Map(
				[
					("a".to_string(), Value::Long(1i64)),
					("b".to_string(), Value::Long(3i64)),
					("c".to_string(), Value::Long(2i64))
				]
				.iter()
				.cloned()
				.collect()
			)
		),
		(
			r#"["string", "null", "long"]"#,
			Value::Union(1, Box::new(Value::Null))
		),
		(
			r#"{"type": "record", "name": "Test", "fields": [{"name": "f", "type": "long"}]}"#,
			Value::Record(vec![("f".to_string(), Value::Long(1))])
		),
		(
			r#"{"type": "record", "name": "LongerRecord", "fields": [{"name": "f", "type": "long"}, {"name": "g", "type": "long"}, {"name": "h", "type": "string"}]}"#,
			Value::Record(vec![
				("f".to_string(), Value::Long(1)),
				("g".to_string(), Value::Long(2)),
				("h".to_string(), Value::String("Abc".to_owned())),
			])
		),
		(
			r#"["null", "string"]"#,
			Value::Union(1, Box::new(Value::String("value".to_string())))
		),
	];
}

#[test]
fn test_round_trip() {
	let config = DatumConfig::new();
	for (raw_schema, value) in SCHEMAS_TO_VALIDATE.iter() {
		let schema: Schema = raw_schema.parse().unwrap();
		let encoded = avro_datum::to_datum_vec(value, &schema, &config).unwrap();
		let decoded = avro_datum::from_datum_slice(&encoded, &schema, &config).unwrap();
		assert_eq!(value, &decoded, "round trip failed for schema {raw_schema}");
	}
}

#[test]
fn test_round_trip_through_buf_read() {
	let config = DatumConfig::new();
	for (raw_schema, value) in SCHEMAS_TO_VALIDATE.iter() {
		let schema: Schema = raw_schema.parse().unwrap();
		let encoded = avro_datum::to_datum_vec(value, &schema, &config).unwrap();
		let decoded =
			avro_datum::from_datum_reader(std::io::BufReader::new(&encoded[..]), &schema, &config)
				.unwrap();
		assert_eq!(value, &decoded, "round trip failed for schema {raw_schema}");
	}
}

#[test]
fn test_round_trip_through_resolution_with_itself() {
	// With writer == reader, decoding through the resolution grammar is
	// equivalent to plain decoding
	let config = DatumConfig::new();
	for (raw_schema, value) in SCHEMAS_TO_VALIDATE.iter() {
		let schema: Schema = raw_schema.parse().unwrap();
		let encoded = avro_datum::to_datum_vec(value, &schema, &config).unwrap();

		let resolution = avro_datum::de::Resolution::new(&schema, &schema).unwrap();
		assert!(resolution.schemas_identical());
		let mut decoder = avro_datum::de::ResolvingDecoder::new(
			&resolution,
			avro_datum::de::read::SliceRead::new(&encoded),
		);
		let decoded = avro_datum::de::DatumReader::new(&schema, &config)
			.read(&mut decoder)
			.unwrap();
		assert_eq!(value, &decoded, "resolution identity failed for schema {raw_schema}");
	}
}

#[test]
fn test_round_trip_through_extended_json() {
	let config = DatumConfig::new();
	for (raw_schema, value) in SCHEMAS_TO_VALIDATE.iter() {
		let schema: Schema = raw_schema.parse().unwrap();
		let json = avro_datum::to_json_string(value, &schema, &config).unwrap();
		let decoded =
			avro_datum::from_json_str(&json, &schema, &config, avro_datum::JsonMode::Strict)
				.unwrap();
		assert_eq!(value, &decoded, "JSON round trip failed for schema {raw_schema}");
	}
}

#[test]
fn test_known_encodings() {
	let config = DatumConfig::new();

	let schema: Schema = r#""int""#.parse().unwrap();
	assert_eq!(
		avro_datum::to_datum_vec(&Value::Int(300), &schema, &config).unwrap(),
		&[0xD8, 0x04]
	);

	let schema: Schema = r#""string""#.parse().unwrap();
	assert_eq!(
		avro_datum::to_datum_vec(&Value::String("foo".to_owned()), &schema, &config).unwrap(),
		&[6, 102, 111, 111]
	);

	let schema: Schema = r#"{"type": "array", "items": "int"}"#.parse().unwrap();
	assert_eq!(
		avro_datum::to_datum_vec(
			&Value::Array(vec![Value::Int(1), Value::Int(2)]),
			&schema,
			&config
		)
		.unwrap(),
		// count 2, items 1 and 2, terminating count 0
		&[4, 2, 4, 0]
	);
}

#[test]
fn test_reuse_allocations() {
	let config = DatumConfig::new();
	let schema: Schema = r#"{"type": "array", "items": "string"}"#.parse().unwrap();
	let reader = avro_datum::de::DatumReader::new(&schema, &config);

	let first = Value::Array(vec![Value::String("one".to_owned())]);
	let encoded = avro_datum::to_datum_vec(&first, &schema, &config).unwrap();
	let decoded = reader
		.read(&mut avro_datum::de::BinaryDecoder::from_slice(&encoded))
		.unwrap();

	let second = Value::Array(vec![
		Value::String("two".to_owned()),
		Value::String("three".to_owned()),
	]);
	let encoded = avro_datum::to_datum_vec(&second, &schema, &config).unwrap();
	let reused = reader
		.read_reusing(
			decoded,
			&mut avro_datum::de::BinaryDecoder::from_slice(&encoded),
		)
		.unwrap();
	assert_eq!(reused, second);
}

#[test]
fn test_truncated_input_is_malformed() {
	let config = DatumConfig::new();
	let schema: Schema = r#""string""#.parse().unwrap();
	// Length 3, but only two bytes follow
	let err = avro_datum::from_datum_slice(&[6, 102, 111], &schema, &config).unwrap_err();
	assert_eq!(err.kind(), avro_datum::ErrorKind::Malformed);
}

#[test]
fn test_overlong_varint_is_malformed() {
	let config = DatumConfig::new();
	let schema: Schema = r#""long""#.parse().unwrap();
	let err =
		avro_datum::from_datum_slice(&[0x80; 11], &schema, &config).unwrap_err();
	assert_eq!(err.kind(), avro_datum::ErrorKind::Malformed);
}
