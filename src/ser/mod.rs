//! Defines everything necessary for encoding avro datums
//!
//! You typically want to use top-level functions such as
//! [`to_datum`](crate::to_datum) but access to this may be necessary for
//! more advanced usage:
//! ```
//! let schema: avro_datum::Schema = r#""int""#.parse().unwrap();
//! let datum_config = avro_datum::logical::DatumConfig::new();
//!
//! let mut encoder = avro_datum::ser::BinaryEncoder::new(Vec::new());
//! avro_datum::ser::DatumWriter::new(&schema, &datum_config)
//! 	.write(&avro_datum::Value::Int(3), &mut encoder)
//! 	.unwrap();
//! assert_eq!(encoder.into_writer(), &[6]);
//! ```

mod binary;
mod writer;

pub use {binary::BinaryEncoder, writer::DatumWriter};

use crate::Error;

/// What a [`DatumWriter`] pushes values into
///
/// The mirror of [`Decoder`](crate::de::Decoder): the binary encoder emits
/// the wire format, the JSON encoder
/// ([`JsonEncoder`](crate::json::JsonEncoder)) builds the extended JSON
/// projection. Structural methods have no-op defaults because the binary
/// wire has no record markers.
///
/// Writers always emit record fields in declaration order.
pub trait Encoder {
	/// Write a `null` value (no bytes on the binary wire)
	fn write_null(&mut self) -> Result<(), Error>;
	/// Write a `boolean` value
	fn write_boolean(&mut self, v: bool) -> Result<(), Error>;
	/// Write an `int` value
	fn write_int(&mut self, v: i32) -> Result<(), Error>;
	/// Write a `long` value
	fn write_long(&mut self, v: i64) -> Result<(), Error>;
	/// Write a `float` value
	fn write_float(&mut self, v: f32) -> Result<(), Error>;
	/// Write a `double` value
	fn write_double(&mut self, v: f64) -> Result<(), Error>;
	/// Write a `bytes` value
	fn write_bytes(&mut self, v: &[u8]) -> Result<(), Error>;
	/// Write a `string` value
	fn write_string(&mut self, v: &str) -> Result<(), Error>;
	/// Write a `fixed` value (the caller has already checked the size)
	fn write_fixed(&mut self, v: &[u8]) -> Result<(), Error>;
	/// Write an `enum` value
	fn write_enum(&mut self, ordinal: usize, symbol: &str) -> Result<(), Error>;

	/// Open a union value: `unwrapped` is set for the `{null, T}` JSON
	/// convention where the branch value is written bare
	fn write_union_start(&mut self, index: usize, label: &str, unwrapped: bool)
		-> Result<(), Error>;
	/// Close a union value
	fn write_union_end(&mut self) -> Result<(), Error> {
		Ok(())
	}

	/// Open an array of `len` items
	fn write_array_start(&mut self, len: usize) -> Result<(), Error>;
	/// Close the current array
	fn write_array_end(&mut self) -> Result<(), Error>;
	/// Open a map of `len` entries
	fn write_map_start(&mut self, len: usize) -> Result<(), Error>;
	/// Write the key of the next map entry
	fn write_map_key(&mut self, key: &str) -> Result<(), Error>;
	/// Close the current map
	fn write_map_end(&mut self) -> Result<(), Error>;

	/// Open a record scope
	fn write_record_start(&mut self) -> Result<(), Error> {
		Ok(())
	}
	/// Announce the next field
	fn write_field_start(&mut self, name: &str) -> Result<(), Error> {
		let _ = name;
		Ok(())
	}
	/// Close the record scope
	fn write_record_end(&mut self) -> Result<(), Error> {
		Ok(())
	}

	/// Whether this encoder can accept raw JSON trees
	/// ([`write_raw_json`](Self::write_raw_json))
	///
	/// Logical-type conversions are only asked for their direct JSON form
	/// when this is `true`.
	fn supports_raw_json(&self) -> bool {
		false
	}

	/// Emit a raw JSON tree in place of the next value, if this encoder can
	///
	/// Only the JSON encoder supports this; it is how logical-type
	/// conversions take over encoding
	/// ([`direct_json_encode`](crate::logical::Conversion::direct_json_encode)).
	/// Returns `false` (having written nothing) when unsupported.
	fn write_raw_json(&mut self, v: &serde_json::Value) -> Result<bool, Error> {
		let _ = v;
		Ok(false)
	}
}
