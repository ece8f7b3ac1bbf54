//! The conversion catalogue: typed views over primitive wire values

use {
	avro_datum::{AnyValue, DatumConfig, JsonMode, Schema, Temporal, Value},
	chrono::{DateTime, NaiveDate, Utc},
	pretty_assertions::assert_eq,
};

fn binary_round_trip(value: &Value, schema: &Schema, config: &DatumConfig) -> Value {
	let bytes = avro_datum::to_datum_vec(value, schema, config).unwrap();
	avro_datum::from_datum_slice(&bytes, schema, config).unwrap()
}

fn json_round_trip(value: &Value, schema: &Schema, config: &DatumConfig) -> Value {
	let json = avro_datum::to_json_string(value, schema, config).unwrap();
	avro_datum::from_json_str(&json, schema, config, JsonMode::Strict).unwrap()
}

#[test]
fn date_is_epoch_days() {
	let config = DatumConfig::new();
	let schema: Schema = r#"{"type": "int", "logicalType": "date"}"#.parse().unwrap();

	let date = Value::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
	assert_eq!(binary_round_trip(&date, &schema, &config), date);
	assert_eq!(json_round_trip(&date, &schema, &config), date);

	// The epoch itself is day 0
	let epoch = Value::Date(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap());
	assert_eq!(
		avro_datum::to_datum_vec(&epoch, &schema, &config).unwrap(),
		&[0]
	);
}

#[test]
fn timestamp_millis_over_long() {
	let config = DatumConfig::new();
	let schema: Schema = r#"{"type": "long", "logicalType": "timestamp-millis"}"#
		.parse()
		.unwrap();
	let instant = DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000).unwrap();
	let value = Value::TimestampMillis(instant);

	// The JSON projection is the raw epoch offset
	assert_eq!(
		avro_datum::to_json_string(&value, &schema, &config).unwrap(),
		"1700000000000"
	);
	assert_eq!(binary_round_trip(&value, &schema, &config), value);
	assert_eq!(json_round_trip(&value, &schema, &config), value);
}

#[test]
fn timestamp_micros_over_long() {
	let config = DatumConfig::new();
	let schema: Schema = r#"{"type": "long", "logicalType": "timestamp-micros"}"#
		.parse()
		.unwrap();
	let instant = DateTime::<Utc>::from_timestamp_micros(1_700_000_000_123_456).unwrap();
	let value = Value::TimestampMicros(instant);
	assert_eq!(binary_round_trip(&value, &schema, &config), value);
	assert_eq!(json_round_trip(&value, &schema, &config), value);
}

#[test]
fn decimal_over_bytes() {
	let config = DatumConfig::new();
	let schema: Schema =
		r#"{"type": "bytes", "logicalType": "decimal", "precision": 10, "scale": 2}"#
			.parse()
			.unwrap();
	let value = Value::Decimal("123.45".parse().unwrap());

	// Two's-complement of unscaled 12345 is 0x30 0x39, length-prefixed
	assert_eq!(
		avro_datum::to_datum_vec(&value, &schema, &config).unwrap(),
		&[0x04, 0x30, 0x39]
	);
	// The JSON projection is a plain number
	assert_eq!(
		avro_datum::to_json_string(&value, &schema, &config).unwrap(),
		"123.45"
	);
	assert_eq!(binary_round_trip(&value, &schema, &config), value);
	assert_eq!(json_round_trip(&value, &schema, &config), value);
}

#[test]
fn negative_decimal_over_bytes() {
	let config = DatumConfig::new();
	let schema: Schema =
		r#"{"type": "bytes", "logicalType": "decimal", "precision": 10, "scale": 2}"#
			.parse()
			.unwrap();
	let value = Value::Decimal("-1.25".parse().unwrap());
	assert_eq!(binary_round_trip(&value, &schema, &config), value);
	assert_eq!(json_round_trip(&value, &schema, &config), value);
}

#[test]
fn decimal_over_fixed_pads_to_declared_size() {
	let config = DatumConfig::new();
	let schema: Schema = r#"{"type": "fixed", "name": "Dec", "size": 4, "logicalType": "decimal", "precision": 8, "scale": 2}"#
		.parse()
		.unwrap();
	let value = Value::Decimal("123.45".parse().unwrap());

	// Unscaled 12345 sign-extends to four bytes
	assert_eq!(
		avro_datum::to_datum_vec(&value, &schema, &config).unwrap(),
		&[0x00, 0x00, 0x30, 0x39]
	);
	assert_eq!(binary_round_trip(&value, &schema, &config), value);
}

#[test]
fn big_integer_over_bytes() {
	let config = DatumConfig::new();
	let schema: Schema = r#"{"type": "bytes", "logicalType": "big-integer"}"#
		.parse()
		.unwrap();
	let value = Value::BigInteger("123456789012345678901234567890".parse().unwrap());
	assert_eq!(binary_round_trip(&value, &schema, &config), value);
	assert_eq!(json_round_trip(&value, &schema, &config), value);
}

#[test]
fn uuid_over_string() {
	let config = DatumConfig::new();
	let schema: Schema = r#"{"type": "string", "logicalType": "uuid"}"#.parse().unwrap();
	let value = Value::Uuid("f81d4fae-7dec-11d0-a765-00a0c91e6bf6".parse().unwrap());
	assert_eq!(binary_round_trip(&value, &schema, &config), value);
	assert_eq!(json_round_trip(&value, &schema, &config), value);

	let err = avro_datum::from_json_str(
		r#""not-a-uuid""#,
		&schema,
		&config,
		JsonMode::Strict,
	)
	.unwrap_err();
	assert_eq!(err.kind(), avro_datum::ErrorKind::LogicalType);
}

#[test]
fn instant_over_long_millis() {
	let config = DatumConfig::new();
	let schema: Schema = r#"{"type": "long", "logicalType": "instant"}"#.parse().unwrap();
	let value = Value::Instant(DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000).unwrap());
	assert_eq!(binary_round_trip(&value, &schema, &config), value);
	assert_eq!(json_round_trip(&value, &schema, &config), value);
}

#[test]
fn instant_over_iso_8601_string() {
	let config = DatumConfig::new();
	let schema: Schema = r#"{"type": "string", "logicalType": "instant"}"#.parse().unwrap();
	let value = Value::Instant(DateTime::<Utc>::from_timestamp_millis(1_700_000_000_123).unwrap());
	assert_eq!(binary_round_trip(&value, &schema, &config), value);
	assert_eq!(json_round_trip(&value, &schema, &config), value);
}

#[test]
fn instant_over_string_with_format_property() {
	let config = DatumConfig::new();
	let schema: Schema =
		r#"{"type": "string", "logicalType": "instant", "format": "%Y-%m-%d %H:%M:%S"}"#
			.parse()
			.unwrap();
	// Whole seconds only, since the format carries no fraction
	let value = Value::Instant(DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap());
	assert_eq!(binary_round_trip(&value, &schema, &config), value);
}

#[test]
fn instant_over_epoch_second_record() {
	let config = DatumConfig::new();
	let schema: Schema = r#"{"type": "record", "name": "Ts", "logicalType": "instant", "fields": [
		{"name": "epochSecond", "type": "long"},
		{"name": "nano", "type": "int"}
	]}"#
	.parse()
	.unwrap();
	let value = Value::Instant(DateTime::<Utc>::from_timestamp(1_700_000_000, 123_000_000).unwrap());
	assert_eq!(binary_round_trip(&value, &schema, &config), value);
	assert_eq!(json_round_trip(&value, &schema, &config), value);
}

#[test]
fn instant_over_millis_record() {
	let config = DatumConfig::new();
	let schema: Schema = r#"{"type": "record", "name": "Ts", "logicalType": "instant", "fields": [
		{"name": "millis", "type": "long"}
	]}"#
	.parse()
	.unwrap();
	let value = Value::Instant(DateTime::<Utc>::from_timestamp_millis(1_700_000_000_001).unwrap());
	assert_eq!(binary_round_trip(&value, &schema, &config), value);
}

#[test]
fn any_temporal_emits_the_narrowest_form() {
	let config = DatumConfig::new();
	let schema: Schema = r#"{"type": "string", "logicalType": "any_temporal"}"#
		.parse()
		.unwrap();

	for (text, expected) in [
		(
			"2024-02-29",
			Temporal::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()),
		),
		("2024-02", Temporal::YearMonth { year: 2024, month: 2 }),
		("2024", Temporal::Year(2024)),
		(
			"2024-02-29T12:34:56",
			Temporal::DateTime(
				NaiveDate::from_ymd_opt(2024, 2, 29)
					.unwrap()
					.and_hms_opt(12, 34, 56)
					.unwrap(),
			),
		),
		(
			"12:34:56",
			Temporal::Time(chrono::NaiveTime::from_hms_opt(12, 34, 56).unwrap()),
		),
	] {
		let json = format!("\"{text}\"");
		let decoded = avro_datum::from_json_str(&json, &schema, &config, JsonMode::Strict).unwrap();
		assert_eq!(decoded, Value::Temporal(expected.clone()), "parsing {text}");
		// The narrowest form round-trips to the same text
		assert_eq!(
			avro_datum::to_json_string(&decoded, &schema, &config).unwrap(),
			json,
			"formatting {text}"
		);
	}
}

#[test]
fn any_embeds_a_value_with_its_schema() {
	let config = DatumConfig::new();
	let schema: Schema = r#"{"type": "record", "name": "AnyVal", "logicalType": "any", "fields": [
		{"name": "avsc", "type": "string"},
		{"name": "content", "type": "bytes"}
	]}"#
	.parse()
	.unwrap();

	let embedded_schema = r#"{"type":"record","name":"Bar","fields":[{"name":"y","type":"string"}]}"#;
	let value = Value::Any(Box::new(AnyValue {
		schema_json: embedded_schema.to_owned(),
		value: Value::Record(vec![("y".to_owned(), Value::String("hi".to_owned()))]),
	}));

	// The JSON form carries the schema text and the content as inline JSON
	let json = avro_datum::to_json_value(&value, &schema, &config).unwrap();
	assert_eq!(
		json,
		serde_json::json!({
			"avsc": embedded_schema,
			"content": {"y": "hi"}
		})
	);
	assert_eq!(
		avro_datum::from_json_value(&json, &schema, &config, JsonMode::Strict).unwrap(),
		value
	);

	// The binary form carries the content as binary-encoded bytes
	assert_eq!(binary_round_trip(&value, &schema, &config), value);
}

#[test]
fn removing_a_conversion_exposes_raw_wire_values() {
	let mut config = DatumConfig::new();
	let schema: Schema = r#"{"type": "int", "logicalType": "date"}"#.parse().unwrap();
	let date = Value::Date(NaiveDate::from_ymd_opt(1970, 1, 2).unwrap());
	let bytes = avro_datum::to_datum_vec(&date, &schema, &config).unwrap();

	config.conversions.remove("date");
	assert_eq!(
		avro_datum::from_datum_slice(&bytes, &schema, &config).unwrap(),
		Value::Int(1)
	);

	config.conversions.clear();
	assert_eq!(
		avro_datum::from_datum_slice(&bytes, &schema, &config).unwrap(),
		Value::Int(1)
	);

	config.conversions.install_defaults();
	assert_eq!(
		avro_datum::from_datum_slice(&bytes, &schema, &config).unwrap(),
		date
	);
}

#[test]
fn logical_types_resolve_inside_unions() {
	let config = DatumConfig::new();
	let schema: Schema = r#"["null", {"type": "long", "logicalType": "timestamp-millis"}]"#
		.parse()
		.unwrap();
	let value = Value::Union(
		1,
		Box::new(Value::TimestampMillis(
			DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000).unwrap(),
		)),
	);
	assert_eq!(binary_round_trip(&value, &schema, &config), value);
	assert_eq!(json_round_trip(&value, &schema, &config), value);
}

#[test]
fn string_byte_view_setting() {
	let mut config = DatumConfig::new();
	config.string_repr = avro_datum::logical::StringRepr::Utf8Bytes;
	let schema: Schema = r#""string""#.parse().unwrap();
	let bytes = avro_datum::to_datum_vec(
		&Value::String("foo".to_owned()),
		&schema,
		&DatumConfig::new(),
	)
	.unwrap();
	assert_eq!(
		avro_datum::from_datum_slice(&bytes, &schema, &config).unwrap(),
		Value::Bytes(b"foo".to_vec())
	);
	// JSON always emits strings
	assert_eq!(
		avro_datum::to_json_string(&Value::Bytes(b"foo".to_vec()), &schema, &config).unwrap(),
		r#""foo""#
	);
}
