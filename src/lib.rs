//! # Getting started
//!
//! ```
//! let schema: avro_datum::Schema = r#"
//! {
//! 	"namespace": "test",
//! 	"type": "record",
//! 	"name": "Test",
//! 	"fields": [
//! 		{
//! 			"type": {
//! 				"type": "string"
//! 			},
//! 			"name": "field"
//! 		}
//! 	]
//! }
//! "#
//! .parse()
//! .expect("Failed to parse schema");
//!
//! let config = avro_datum::DatumConfig::new();
//!
//! let datum = avro_datum::Value::Record(vec![(
//! 	"field".to_owned(),
//! 	avro_datum::Value::String("foo".to_owned()),
//! )]);
//! let avro_datum = &[6, 102, 111, 111];
//!
//! // Avro datum decoding
//! assert_eq!(
//! 	avro_datum::from_datum_slice(avro_datum, &schema, &config).expect("Failed to decode"),
//! 	datum
//! );
//!
//! // Avro datum encoding
//! assert_eq!(
//! 	avro_datum::to_datum_vec(&datum, &schema, &config).expect("Failed to encode"),
//! 	avro_datum
//! );
//! ```
//!
//! # Schema resolution
//!
//! When the bytes were written with a different (older or newer) schema
//! than the one the application reads with, use
//! [`resolve_datum_slice`]/[`resolve_datum_reader`]: the two schemas fuse
//! into a resolution grammar that reorders fields, skips writer-only
//! fields, injects reader-side defaults, widens promotable primitives and
//! remaps enums and unions - all while decoding the writer's byte stream in
//! a single pass.
//!
//! # Extended JSON
//!
//! [`from_json_str`] and [`to_json_string`] move datums through the JSON
//! projection of the binary format: records tolerate any field order and
//! missing fields fill from reader defaults, `{null, T}` unions are
//! unwrapped, and logical types may override their representation (a
//! decimal is a plain number, an `any` embeds raw JSON).
//!
//! # Logical types
//!
//! Decoded values surface typed views (dates, timestamps, decimals,
//! UUIDs...) for schema nodes annotated with a logical type, driven by the
//! [`ConversionRegistry`](logical::ConversionRegistry) of the
//! [`DatumConfig`] in use. See the [`logical`] module.

pub mod de;
mod error;
mod grammar;
pub mod json;
pub mod logical;
pub mod schema;
pub mod ser;
mod value;

pub use {
	error::{Error, ErrorKind},
	json::JsonMode,
	logical::DatumConfig,
	schema::Schema,
	value::{AnyValue, Temporal, Value},
};

use {
	de::{read, BinaryDecoder, DatumReader, DecoderConfig, ResolvingDecoder},
	json::{JsonDecoder, JsonEncoder, JsonGrammar},
	ser::{BinaryEncoder, DatumWriter},
};

/// Decode an avro "datum" (raw data, no headers...) from a slice
///
/// The writer is assumed to have used `schema` as well; if it did not, use
/// [`resolve_datum_slice`].
pub fn from_datum_slice(
	slice: &[u8],
	schema: &Schema,
	config: &DatumConfig,
) -> Result<Value, Error> {
	DatumReader::new(schema, config).read(&mut BinaryDecoder::from_slice(slice))
}

/// Decode an avro "datum" (raw data, no headers...) from an `impl BufRead`
///
/// If you only have an `impl Read`, wrap it in a
/// [`BufReader`](std::io::BufReader) first.
///
/// If decoding from a slice, a `Vec`, ... prefer using
/// [`from_datum_slice`], as it will be more performant.
pub fn from_datum_reader<R>(reader: R, schema: &Schema, config: &DatumConfig) -> Result<Value, Error>
where
	R: std::io::BufRead,
{
	DatumReader::new(schema, config).read(&mut BinaryDecoder::with_config(
		read::ReaderRead::new(reader),
		DecoderConfig::new(),
	))
}

/// Decode an avro "datum" written with `writer_schema` into values shaped
/// by `reader_schema`
///
/// When the two schemas have the same canonical form this is equivalent to
/// (and as cheap as) [`from_datum_slice`]; otherwise the resolution grammar
/// for the pair drives the decode (and is interned process-wide, so
/// resolving the same pair again is cheap).
pub fn resolve_datum_slice(
	slice: &[u8],
	writer_schema: &Schema,
	reader_schema: &Schema,
	config: &DatumConfig,
) -> Result<Value, Error> {
	let resolution = de::Resolution::new(writer_schema, reader_schema)?;
	if resolution.schemas_identical() {
		return from_datum_slice(slice, reader_schema, config);
	}
	DatumReader::new(reader_schema, config).read(&mut ResolvingDecoder::new(
		&resolution,
		read::SliceRead::new(slice),
	))
}

/// Decode an avro "datum" written with `writer_schema` from an
/// `impl BufRead`, into values shaped by `reader_schema`
pub fn resolve_datum_reader<R>(
	reader: R,
	writer_schema: &Schema,
	reader_schema: &Schema,
	config: &DatumConfig,
) -> Result<Value, Error>
where
	R: std::io::BufRead,
{
	let resolution = de::Resolution::new(writer_schema, reader_schema)?;
	if resolution.schemas_identical() {
		return from_datum_reader(reader, reader_schema, config);
	}
	DatumReader::new(reader_schema, config).read(&mut ResolvingDecoder::new(
		&resolution,
		read::ReaderRead::new(reader),
	))
}

/// Encode an avro "datum" (raw data, no headers...) to the provided writer
pub fn to_datum<W>(
	value: &Value,
	writer: W,
	schema: &Schema,
	config: &DatumConfig,
) -> Result<W, Error>
where
	W: std::io::Write,
{
	let mut encoder = BinaryEncoder::new(writer);
	DatumWriter::new(schema, config).write(value, &mut encoder)?;
	Ok(encoder.into_writer())
}

/// Encode an avro "datum" (raw data, no headers...) to a newly allocated
/// `Vec`
///
/// Note that unless you would otherwise allocate a new `Vec` anyway, it
/// will be more efficient to use [`to_datum`] instead.
pub fn to_datum_vec(value: &Value, schema: &Schema, config: &DatumConfig) -> Result<Vec<u8>, Error> {
	to_datum(value, Vec::new(), schema, config)
}

/// Decode a datum from its extended JSON text
///
/// `mode` selects whether fields unknown to `schema` fail
/// ([`Strict`](JsonMode::Strict)) or are skipped
/// ([`Lenient`](JsonMode::Lenient)).
pub fn from_json_str(
	json: &str,
	schema: &Schema,
	config: &DatumConfig,
	mode: JsonMode,
) -> Result<Value, Error> {
	let grammar = JsonGrammar::new(schema);
	let mut decoder = JsonDecoder::new(&grammar, json, mode)?;
	DatumReader::new(schema, config).read(&mut decoder)
}

/// Decode a datum from an already-parsed extended JSON tree
pub fn from_json_value(
	json: &serde_json::Value,
	schema: &Schema,
	config: &DatumConfig,
	mode: JsonMode,
) -> Result<Value, Error> {
	let grammar = JsonGrammar::new(schema);
	let mut decoder = JsonDecoder::from_value(&grammar, json, mode);
	DatumReader::new(schema, config).read(&mut decoder)
}

/// Encode a datum to its extended JSON tree
///
/// Record fields are always emitted in declaration order.
pub fn to_json_value(
	value: &Value,
	schema: &Schema,
	config: &DatumConfig,
) -> Result<serde_json::Value, Error> {
	let mut encoder = JsonEncoder::new();
	DatumWriter::new(schema, config).write(value, &mut encoder)?;
	Ok(encoder.into_value())
}

/// Encode a datum to its extended JSON text
pub fn to_json_string(
	value: &Value,
	schema: &Schema,
	config: &DatumConfig,
) -> Result<String, Error> {
	let mut encoder = JsonEncoder::new();
	DatumWriter::new(schema, config).write(value, &mut encoder)?;
	encoder.into_string()
}
