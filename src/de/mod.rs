//! Defines everything necessary for decoding avro datums
//!
//! You typically want to use top-level functions such as
//! [`from_datum_slice`](crate::from_datum_slice) but access to this may be
//! necessary for more advanced usage.
//!
//! This gives manual access to the decoders and to the configuration
//! parameters meant to prevent DOS:
//! - [`DecoderConfig::max_seq_size`]
//! - [`read::ReaderRead::max_alloc_size`]
//!
//! Such usage would go as follows:
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
//! let avro_datum: &[u8] = &[6, 102, 111, 111];
//!
//! // Of course, don't actually use `ReaderRead` if you have a slice
//! let mut avro_reader = avro_datum::de::read::ReaderRead::new(avro_datum);
//!
//! // Now we can set some custom parameters
//! avro_reader.max_alloc_size = 32 * 1024;
//!
//! // We can also set parameters that are common to the slice version and
//! // the reader version
//! let mut decoder_config = avro_datum::de::DecoderConfig::new();
//! decoder_config.max_seq_size = 1_000_000;
//!
//! let mut decoder = avro_datum::de::BinaryDecoder::with_config(avro_reader, decoder_config);
//! let datum_config = avro_datum::logical::DatumConfig::new();
//! let value = avro_datum::de::DatumReader::new(&schema, &datum_config)
//! 	.read(&mut decoder)
//! 	.expect("Failed to decode");
//! assert_eq!(
//! 	value,
//! 	avro_datum::Value::Record(vec![(
//! 		"field".to_owned(),
//! 		avro_datum::Value::String("foo".to_owned())
//! 	)])
//! );
//! ```

mod binary;
pub mod read;
mod reader;
mod resolving;

pub use {
	binary::BinaryDecoder,
	reader::DatumReader,
	resolving::{Resolution, ResolvingDecoder},
};

use crate::{
	schema::{Record, RecordField},
	Error,
};

/// Limits applied while decoding, to avoid running away on malformed input
#[derive(Clone, Debug)]
pub struct DecoderConfig {
	/// If a sequence (array or map) declares more total items than this
	/// during decoding, we will throw a `Capacity` error instead.
	///
	/// This is to avoid running into an infinite loop at decoding time.
	/// Default for this is `1 000 000 000` (~1s CPU time)
	///
	/// Note that if you're decoding from an `impl BufRead` instead of a
	/// slice (consequently using [`read::ReaderRead`]), there's an
	/// additional similar parameter
	/// [there](read::ReaderRead::max_alloc_size) that you may want to
	/// configure.
	pub max_seq_size: u64,
}

impl DecoderConfig {
	/// Construct a `DecoderConfig` with all parameters set to their default
	/// values
	pub fn new() -> Self {
		Self {
			max_seq_size: 1_000_000_000,
		}
	}
}

impl Default for DecoderConfig {
	fn default() -> Self {
		Self::new()
	}
}

/// What a [`DatumReader`] pulls values out of
///
/// This is the capability record all decoding flows share: the binary
/// decoder reads the wire directly, the resolving decoder reconciles a
/// writer schema on the way, and the JSON decoder
/// ([`JsonDecoder`](crate::json::JsonDecoder)) reads the extended JSON
/// projection. The datum reader recurses over the *reader* schema and is
/// oblivious to which of them it is driving.
///
/// The record-shaped methods have no-op defaults because the plain binary
/// wire carries no record structure: fields simply follow each other in
/// declaration order.
pub trait Decoder {
	/// Read a `null` value (no bytes on the binary wire)
	fn read_null(&mut self) -> Result<(), Error>;
	/// Read a `boolean` value
	fn read_boolean(&mut self) -> Result<bool, Error>;
	/// Read an `int` value
	fn read_int(&mut self) -> Result<i32, Error>;
	/// Read a `long` value
	fn read_long(&mut self) -> Result<i64, Error>;
	/// Read a `float` value
	fn read_float(&mut self) -> Result<f32, Error>;
	/// Read a `double` value
	fn read_double(&mut self) -> Result<f64, Error>;
	/// Read a `bytes` value
	fn read_bytes(&mut self) -> Result<Vec<u8>, Error>;
	/// Read a `string` value
	fn read_string(&mut self) -> Result<String, Error>;
	/// Read a `string` value as its raw UTF-8 bytes (used when the datum
	/// model is configured for the byte view of strings)
	fn read_string_bytes(&mut self) -> Result<Vec<u8>, Error> {
		Ok(self.read_string()?.into_bytes())
	}
	/// Read a `fixed` value of the schema-declared size
	fn read_fixed(&mut self, size: usize) -> Result<Vec<u8>, Error>;
	/// Read an `enum` value as an ordinal into the *reader's* symbol table
	fn read_enum(&mut self) -> Result<usize, Error>;
	/// Read a union tag as a branch index into the *reader's* union
	fn read_union_index(&mut self) -> Result<usize, Error>;

	/// Enter an array
	fn read_array_start(&mut self) -> Result<(), Error>;
	/// Whether another array item follows; consumes nothing of the item
	/// itself
	fn read_array_next(&mut self) -> Result<bool, Error>;
	/// Enter a map
	fn read_map_start(&mut self) -> Result<(), Error>;
	/// Whether another map entry follows
	fn read_map_next(&mut self) -> Result<bool, Error>;
	/// Read the key of the current map entry
	fn read_map_key(&mut self) -> Result<String, Error>;

	/// Enter a record scope
	fn read_record_start(&mut self) -> Result<(), Error> {
		Ok(())
	}
	/// The order in which this decoder will surface the record's fields:
	/// reader positions, in read order
	///
	/// The datum reader places each decoded value at the surfaced position,
	/// which is what guarantees fields are observed in declaration order
	/// regardless of the writer's layout.
	fn read_field_order(&mut self, record: &Record) -> Result<Vec<usize>, Error> {
		Ok((0..record.fields.len()).collect())
	}
	/// Position the input at the given field
	fn read_field_start(&mut self, field: &RecordField) -> Result<(), Error> {
		let _ = field;
		Ok(())
	}
	/// Leave the current field
	fn read_field_end(&mut self) -> Result<(), Error> {
		Ok(())
	}
	/// Leave the record scope
	fn read_record_end(&mut self) -> Result<(), Error> {
		Ok(())
	}

	/// Capture the next value as a raw JSON tree, advancing past it
	///
	/// Only the JSON decoder supports this; it is how logical-type
	/// conversions take over decoding
	/// ([`direct_json_decode`](crate::logical::Conversion::direct_json_decode)).
	/// Decoders that return `None` have not consumed anything.
	fn read_raw_json(&mut self) -> Result<Option<serde_json::Value>, Error> {
		Ok(None)
	}

	/// Process whatever trails the last value of the datum (writer-only
	/// fields to skip, scopes to close)
	fn drain(&mut self) -> Result<(), Error> {
		Ok(())
	}
}
