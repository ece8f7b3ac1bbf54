//! The extended JSON projection of the Avro binary format
//!
//! Compared to a naive JSON mapping, the decoder here reads record fields in
//! any order (buffering out-of-order subtrees until their reader-side turn),
//! injects reader defaults for missing fields, optionally tolerates unknown
//! fields, unwraps `{null, T}` unions, and accepts the extended scalar
//! spellings for `bytes` (ISO-8859-1 strings, integers, decimal numbers).
//!
//! The encoder is the inverse and always emits fields in declaration order.

mod de;
mod ser;

pub use {
	de::{JsonDecoder, JsonGrammar},
	ser::JsonEncoder,
};

use crate::{Error, ErrorKind};

/// How the JSON decoder treats fields the reader schema does not declare
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum JsonMode {
	/// Unknown fields fail with [`ErrorKind::UnknownField`](crate::ErrorKind::UnknownField)
	#[default]
	Strict,
	/// Unknown fields are skipped
	Lenient,
}

/// One JSON event, in document order
///
/// The decoder's input is a flat stream of these, produced from a
/// [`serde_json::Value`]; reorder buffers capture sub-slices of the stream
/// and splice them back when the reader asks for the corresponding field.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum JsonToken {
	ObjectStart,
	ObjectEnd,
	ArrayStart,
	ArrayEnd,
	FieldName(String),
	Null,
	Bool(bool),
	Number(serde_json::Number),
	String(String),
}

/// Flatten a JSON tree into tokens, appending to `out`
pub(crate) fn tokenize(value: &serde_json::Value, out: &mut Vec<JsonToken>) {
	match value {
		serde_json::Value::Null => out.push(JsonToken::Null),
		serde_json::Value::Bool(b) => out.push(JsonToken::Bool(*b)),
		serde_json::Value::Number(n) => out.push(JsonToken::Number(n.clone())),
		serde_json::Value::String(s) => out.push(JsonToken::String(s.clone())),
		serde_json::Value::Array(items) => {
			out.push(JsonToken::ArrayStart);
			for item in items {
				tokenize(item, out);
			}
			out.push(JsonToken::ArrayEnd);
		}
		serde_json::Value::Object(entries) => {
			out.push(JsonToken::ObjectStart);
			for (key, entry) in entries {
				out.push(JsonToken::FieldName(key.clone()));
				tokenize(entry, out);
			}
			out.push(JsonToken::ObjectEnd);
		}
	}
}

/// The maximum JSON nesting depth of an out-of-order field subtree the
/// reorder buffer will capture
pub(crate) const FIELD_CAPTURE_MAX_DEPTH: usize = 8;

/// The maximum JSON nesting depth of a materialized reader default
pub(crate) const DEFAULT_CAPTURE_MAX_DEPTH: usize = 2;

/// Flatten a JSON tree into tokens, failing with `Capacity` past
/// `max_depth` levels of nesting
pub(crate) fn tokenize_bounded(
	value: &serde_json::Value,
	out: &mut Vec<JsonToken>,
	max_depth: usize,
) -> Result<(), Error> {
	if max_depth == 0 {
		return Err(Error::new(
			ErrorKind::Capacity,
			"JSON subtree is nested deeper than the capture limit",
		));
	}
	match value {
		serde_json::Value::Array(items) => {
			out.push(JsonToken::ArrayStart);
			for item in items {
				tokenize_bounded(item, out, max_depth - 1)?;
			}
			out.push(JsonToken::ArrayEnd);
		}
		serde_json::Value::Object(entries) => {
			out.push(JsonToken::ObjectStart);
			for (key, entry) in entries {
				out.push(JsonToken::FieldName(key.clone()));
				tokenize_bounded(entry, out, max_depth - 1)?;
			}
			out.push(JsonToken::ObjectEnd);
		}
		scalar => tokenize(scalar, out),
	}
	Ok(())
}

/// A JSON string spells raw bytes in ISO-8859-1: every char is one byte
///
/// Returns `None` when a char is above U+00FF and cannot be a byte.
pub(crate) fn string_to_bytes(s: &str) -> Option<Vec<u8>> {
	s.chars()
		.map(|c| u8::try_from(u32::from(c)).ok())
		.collect()
}

/// The inverse of [`string_to_bytes`]: every byte becomes one char
pub(crate) fn bytes_to_string(bytes: &[u8]) -> String {
	bytes.iter().map(|&b| char::from(b)).collect()
}

/// The extended spelling of `bytes` as a JSON number
///
/// An integer becomes its two's-complement big-endian bytes (the
/// `big-integer` logical type's wire form); a fractional number becomes the
/// two's-complement bytes of its unscaled value (the `decimal` logical
/// type's wire form, at the number's own scale).
pub(crate) fn number_to_bytes(n: &serde_json::Number) -> Result<Vec<u8>, Error> {
	if let Some(i) = n.as_i64() {
		return Ok(num_bigint::BigInt::from(i).to_signed_bytes_be());
	}
	if let Some(u) = n.as_u64() {
		return Ok(num_bigint::BigInt::from(u).to_signed_bytes_be());
	}
	let decimal: rust_decimal::Decimal = n.to_string().parse().map_err(|e| {
		Error::custom(
			ErrorKind::Malformed,
			format_args!("Cannot read JSON number {n} as bytes: {e}"),
		)
	})?;
	Ok(crate::logical::minimal_two_complement(decimal.mantissa()))
}
