//! Typed views over primitive wire values
//!
//! A [`Conversion`] maps between a typed [`Value`] variant (a date, a
//! decimal, an embedded `any` datum...) and the primitive wire value its
//! logical type annotates. The datum reader and writer consult the
//! [`ConversionRegistry`] of their [`DatumConfig`] at every schema node: no
//! registration means the raw wire value is surfaced unchanged.

mod conversions;

pub use conversions::{
	AnyConversion, AnyTemporalConversion, BigIntegerConversion, DateConversion,
	DecimalConversion, InstantConversion, TimestampMicrosConversion, TimestampMillisConversion,
	UuidConversion,
};

use crate::{
	schema::{Schema, SchemaKey, SchemaNode},
	Error, Value,
};

use std::{collections::HashMap, sync::Arc};

/// How string-typed fields surface in decoded [`Value`]s
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum StringRepr {
	/// `Value::String`, UTF-8 validated
	#[default]
	Native,
	/// `Value::Bytes`, skipping UTF-8 validation (the raw byte view)
	Utf8Bytes,
}

/// Per-datum-model context: conversions and representation choices
///
/// This replaces any process-global state: construct one at startup and
/// pass it to readers and writers. Mutating the registry while a decode is
/// in flight is not possible (readers borrow the config).
#[derive(Clone)]
pub struct DatumConfig {
	/// The logical-type conversions in effect
	pub conversions: ConversionRegistry,
	/// How string-typed fields decode (JSON always emits strings)
	pub string_repr: StringRepr,
	/// If a datum turns out to be deeper than this, reading or writing
	/// fails with a `Capacity` error instead of overflowing the stack.
	/// Default is `64`.
	pub allowed_depth: usize,
}

impl DatumConfig {
	/// A config with the standard conversion catalogue installed
	pub fn new() -> Self {
		Self {
			conversions: ConversionRegistry::defaults(),
			string_repr: StringRepr::default(),
			allowed_depth: 64,
		}
	}

	/// A config with no conversions: logical types surface their raw wire
	/// values
	pub fn raw() -> Self {
		Self {
			conversions: ConversionRegistry::empty(),
			..Self::new()
		}
	}
}

impl Default for DatumConfig {
	fn default() -> Self {
		Self::new()
	}
}

/// What a [`Conversion`] gets to look at while converting
#[derive(Clone, Copy)]
pub struct ConversionContext<'a> {
	/// The schema the datum is being read or written with
	pub schema: &'a Schema,
	/// The node carrying the logical type
	pub key: SchemaKey,
	/// The enclosing datum-model config (for conversions that recurse into
	/// nested reads/writes, like `any`)
	pub config: &'a DatumConfig,
}

impl<'a> ConversionContext<'a> {
	/// The schema node carrying the logical type
	pub fn node(&self) -> &'a SchemaNode {
		&self.schema[self.key]
	}

	/// A named string property of the node (e.g. `format` on `instant`)
	pub fn string_property(&self, name: &str) -> Option<&'a str> {
		self.node().properties.get(name).and_then(|v| v.as_str())
	}
}

/// Bidirectional mapping between a typed value and its underlying wire
/// value
///
/// `to_wire`/`from_wire` operate on already-decoded wire [`Value`]s. The
/// optional direct-JSON hooks let a conversion take over the JSON
/// representation entirely (a decimal as a plain number, an `any` embedding
/// raw JSON); they are only consulted when the codec in use supports raw
/// JSON trees.
pub trait Conversion: Send + Sync {
	/// The logical-type name this conversion registers under
	fn name(&self) -> &'static str;

	/// Typed value -> wire value; must pass already-wire-shaped values
	/// through unchanged
	fn to_wire(&self, typed: &Value, ctx: ConversionContext<'_>) -> Result<Value, Error>;

	/// Wire value -> typed value
	fn from_wire(&self, wire: Value, ctx: ConversionContext<'_>) -> Result<Value, Error>;

	/// Whether [`direct_json_decode`](Self::direct_json_decode) should be
	/// consulted (the raw tree is consumed from the input before the call,
	/// so this must be accurate)
	fn has_direct_json_decode(&self) -> bool {
		false
	}

	/// Decode straight from a raw JSON tree, bypassing the primitive read
	fn direct_json_decode(
		&self,
		raw: serde_json::Value,
		ctx: ConversionContext<'_>,
	) -> Result<Value, Error> {
		let _ = (raw, ctx);
		Err(Error::new(
			crate::ErrorKind::LogicalType,
			"This conversion does not support direct JSON decoding",
		))
	}

	/// Encode straight to a raw JSON tree, bypassing the primitive write;
	/// `Ok(None)` declines and falls back to
	/// [`to_wire`](Self::to_wire) + primitive write
	fn direct_json_encode(
		&self,
		typed: &Value,
		ctx: ConversionContext<'_>,
	) -> Result<Option<serde_json::Value>, Error> {
		let _ = (typed, ctx);
		Ok(None)
	}
}

/// Maps logical-type names to [`Conversion`]s, per datum-model instance
#[derive(Clone, Default)]
pub struct ConversionRegistry {
	by_name: HashMap<String, Arc<dyn Conversion>>,
}

impl ConversionRegistry {
	/// A registry with no conversions registered
	pub fn empty() -> Self {
		Self::default()
	}

	/// A registry with the standard catalogue installed
	pub fn defaults() -> Self {
		let mut registry = Self::empty();
		registry.install_defaults();
		registry
	}

	/// Install the standard catalogue (replacing same-named registrations)
	pub fn install_defaults(&mut self) -> &mut Self {
		self.add(Arc::new(DateConversion))
			.add(Arc::new(TimestampMillisConversion))
			.add(Arc::new(TimestampMicrosConversion))
			.add(Arc::new(DecimalConversion))
			.add(Arc::new(BigIntegerConversion))
			.add(Arc::new(UuidConversion))
			.add(Arc::new(InstantConversion))
			.add(Arc::new(AnyTemporalConversion))
			.add(Arc::new(AnyConversion))
	}

	/// Register a conversion by its logical-type name, replacing any prior
	/// registration under that name
	pub fn add(&mut self, conversion: Arc<dyn Conversion>) -> &mut Self {
		self.by_name.insert(conversion.name().to_owned(), conversion);
		self
	}

	/// Deregister; subsequent reads of that logical type expose raw wire
	/// values
	pub fn remove(&mut self, name: &str) -> &mut Self {
		self.by_name.remove(name);
		self
	}

	/// Drop all registrations
	pub fn clear(&mut self) -> &mut Self {
		self.by_name.clear();
		self
	}

	pub(crate) fn get(&self, name: &str) -> Option<&dyn Conversion> {
		self.by_name.get(name).map(|c| &**c)
	}
}

/// The minimal-length big-endian two's-complement encoding of an unscaled
/// value (what `decimal` and `big-integer` put on the wire)
pub(crate) fn minimal_two_complement(unscaled: i128) -> Vec<u8> {
	let buf: [u8; 16] = unscaled.to_be_bytes();
	// If it's a negative number we can ignore all 0xff followed by MSB at 1.
	// If it's a positive number we can ignore all 0x00 followed by MSB at 0.
	let mut can_truncate = 0;
	if buf[0] & 0x80 == 0 {
		while buf.get(can_truncate).map_or(false, |&v| v == 0x00) {
			can_truncate += 1;
		}
		if can_truncate != 0 && buf.get(can_truncate).map_or(true, |&v| v & 0x80 != 0) {
			can_truncate -= 1;
		}
	} else {
		while buf.get(can_truncate).map_or(false, |&v| v == 0xFF) {
			can_truncate += 1;
		}
		if can_truncate != 0 && buf.get(can_truncate).map_or(true, |&v| v & 0x80 == 0) {
			can_truncate -= 1;
		}
	}
	buf[can_truncate..].to_vec()
}

/// The inverse of [`minimal_two_complement`]: `None` when the value does
/// not fit in an `i128`
pub(crate) fn i128_from_two_complement(bytes: &[u8]) -> Option<i128> {
	if bytes.is_empty() {
		return Some(0);
	}
	if bytes.len() > 16 {
		return None;
	}
	let fill = if bytes[0] & 0x80 != 0 { 0xFF } else { 0x00 };
	let mut buf = [fill; 16];
	buf[16 - bytes.len()..].copy_from_slice(bytes);
	Some(i128::from_be_bytes(buf))
}

#[cfg(test)]
mod tests {
	use {super::*, pretty_assertions::assert_eq};

	#[test]
	fn two_complement_minimal_length() {
		assert_eq!(minimal_two_complement(0), vec![0x00]);
		assert_eq!(minimal_two_complement(1), vec![0x01]);
		assert_eq!(minimal_two_complement(-1), vec![0xFF]);
		assert_eq!(minimal_two_complement(127), vec![0x7F]);
		assert_eq!(minimal_two_complement(128), vec![0x00, 0x80]);
		assert_eq!(minimal_two_complement(-128), vec![0x80]);
		assert_eq!(minimal_two_complement(12345), vec![0x30, 0x39]);
	}

	#[test]
	fn two_complement_round_trip() {
		for v in [0i128, 1, -1, 127, 128, -128, -129, 12345, i128::MAX, i128::MIN] {
			assert_eq!(i128_from_two_complement(&minimal_two_complement(v)), Some(v));
		}
	}
}
