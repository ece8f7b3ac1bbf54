use super::bytes_to_string;

use crate::{ser::Encoder, Error, ErrorKind};

/// Encodes a datum into the extended JSON projection
///
/// Builds the [`serde_json::Value`] tree bottom-up; record fields are
/// emitted in the order the datum writer visits them, which is always
/// declaration order.
pub struct JsonEncoder {
	frames: Vec<Frame>,
	out: Option<serde_json::Value>,
}

enum Frame {
	Array(Vec<serde_json::Value>),
	Object {
		entries: serde_json::Map<String, serde_json::Value>,
		pending_key: Option<String>,
	},
	/// A `{"<branchLabel>": value}` union tag object
	UnionTag {
		label: String,
		value: Option<serde_json::Value>,
	},
}

impl JsonEncoder {
	/// Construct an empty `JsonEncoder`
	pub fn new() -> Self {
		Self {
			frames: Vec::new(),
			out: None,
		}
	}

	/// The encoded JSON tree
	///
	/// # Panics
	/// If no complete datum was written.
	pub fn into_value(self) -> serde_json::Value {
		self.out.expect("no complete datum was written")
	}

	/// The encoded JSON text
	pub fn into_string(self) -> Result<String, Error> {
		serde_json::to_string(&self.into_value()).map_err(|e| {
			Error::custom(ErrorKind::Malformed, format_args!("Cannot serialize JSON: {e}"))
		})
	}

	fn emit(&mut self, value: serde_json::Value) -> Result<(), Error> {
		match self.frames.last_mut() {
			None => self.out = Some(value),
			Some(Frame::Array(items)) => items.push(value),
			Some(Frame::Object {
				entries,
				pending_key,
			}) => {
				let key = pending_key.take().ok_or_else(|| {
					Error::new(
						ErrorKind::TypeMismatch,
						"JSON object value written without a pending key",
					)
				})?;
				entries.insert(key, value);
			}
			Some(Frame::UnionTag { value: slot, .. }) => {
				*slot = Some(value);
			}
		}
		Ok(())
	}

	fn emit_number(&mut self, n: Option<serde_json::Number>) -> Result<(), Error> {
		let n = n.ok_or_else(|| {
			Error::new(
				ErrorKind::TypeMismatch,
				"Non-finite floating point values have no JSON representation",
			)
		})?;
		self.emit(serde_json::Value::Number(n))
	}
}

impl Default for JsonEncoder {
	fn default() -> Self {
		Self::new()
	}
}

impl Encoder for JsonEncoder {
	fn write_null(&mut self) -> Result<(), Error> {
		self.emit(serde_json::Value::Null)
	}

	fn write_boolean(&mut self, v: bool) -> Result<(), Error> {
		self.emit(serde_json::Value::Bool(v))
	}

	fn write_int(&mut self, v: i32) -> Result<(), Error> {
		self.emit(serde_json::Value::Number(v.into()))
	}

	fn write_long(&mut self, v: i64) -> Result<(), Error> {
		self.emit(serde_json::Value::Number(v.into()))
	}

	fn write_float(&mut self, v: f32) -> Result<(), Error> {
		self.emit_number(serde_json::Number::from_f64(f64::from(v)))
	}

	fn write_double(&mut self, v: f64) -> Result<(), Error> {
		self.emit_number(serde_json::Number::from_f64(v))
	}

	fn write_bytes(&mut self, v: &[u8]) -> Result<(), Error> {
		// Raw bytes in ISO-8859-1: one char per byte
		self.emit(serde_json::Value::String(bytes_to_string(v)))
	}

	fn write_string(&mut self, v: &str) -> Result<(), Error> {
		self.emit(serde_json::Value::String(v.to_owned()))
	}

	fn write_fixed(&mut self, v: &[u8]) -> Result<(), Error> {
		self.write_bytes(v)
	}

	fn write_enum(&mut self, _ordinal: usize, symbol: &str) -> Result<(), Error> {
		self.emit(serde_json::Value::String(symbol.to_owned()))
	}

	fn write_union_start(
		&mut self,
		_index: usize,
		label: &str,
		unwrapped: bool,
	) -> Result<(), Error> {
		// null is always written bare; so is the value of a union with a
		// single non-null branch
		if !unwrapped && label != "null" {
			self.frames.push(Frame::UnionTag {
				label: label.to_owned(),
				value: None,
			});
		}
		Ok(())
	}

	fn write_union_end(&mut self) -> Result<(), Error> {
		if let Some(Frame::UnionTag { .. }) = self.frames.last() {
			let Some(Frame::UnionTag { label, value }) = self.frames.pop() else {
				unreachable!("just checked");
			};
			let value = value.ok_or_else(|| {
				Error::new(ErrorKind::UnionBranch, "Union tag object closed without a value")
			})?;
			let mut entries = serde_json::Map::with_capacity(1);
			entries.insert(label, value);
			self.emit(serde_json::Value::Object(entries))?;
		}
		Ok(())
	}

	fn write_array_start(&mut self, len: usize) -> Result<(), Error> {
		self.frames.push(Frame::Array(Vec::with_capacity(len)));
		Ok(())
	}

	fn write_array_end(&mut self) -> Result<(), Error> {
		match self.frames.pop() {
			Some(Frame::Array(items)) => self.emit(serde_json::Value::Array(items)),
			_ => Err(Error::new(
				ErrorKind::TypeMismatch,
				"Array end without matching array start",
			)),
		}
	}

	fn write_map_start(&mut self, len: usize) -> Result<(), Error> {
		self.frames.push(Frame::Object {
			entries: serde_json::Map::with_capacity(len),
			pending_key: None,
		});
		Ok(())
	}

	fn write_map_key(&mut self, key: &str) -> Result<(), Error> {
		match self.frames.last_mut() {
			Some(Frame::Object { pending_key, .. }) => {
				*pending_key = Some(key.to_owned());
				Ok(())
			}
			_ => Err(Error::new(
				ErrorKind::TypeMismatch,
				"Map key written outside of a map",
			)),
		}
	}

	fn write_map_end(&mut self) -> Result<(), Error> {
		match self.frames.pop() {
			Some(Frame::Object { entries, .. }) => self.emit(serde_json::Value::Object(entries)),
			_ => Err(Error::new(
				ErrorKind::TypeMismatch,
				"Map end without matching map start",
			)),
		}
	}

	fn write_record_start(&mut self) -> Result<(), Error> {
		self.frames.push(Frame::Object {
			entries: serde_json::Map::new(),
			pending_key: None,
		});
		Ok(())
	}

	fn write_field_start(&mut self, name: &str) -> Result<(), Error> {
		self.write_map_key(name)
	}

	fn write_record_end(&mut self) -> Result<(), Error> {
		self.write_map_end()
	}

	fn supports_raw_json(&self) -> bool {
		true
	}

	fn write_raw_json(&mut self, v: &serde_json::Value) -> Result<bool, Error> {
		self.emit(v.clone())?;
		Ok(true)
	}
}
