use super::Encoder;

use crate::{Error, ErrorKind};

use {integer_encoding::VarIntWriter, std::io::Write};

/// Encodes the Avro binary format
///
/// Arrays and maps are written as a single block followed by the
/// terminating zero count.
pub struct BinaryEncoder<W> {
	writer: W,
}

impl<W: Write> BinaryEncoder<W> {
	/// Construct a `BinaryEncoder` over any [`Write`](std::io::Write)
	pub fn new(writer: W) -> Self {
		Self { writer }
	}

	/// Get writer back
	pub fn into_writer(self) -> W {
		self.writer
	}

	fn write_len(&mut self, len: usize) -> Result<(), Error> {
		let len: i64 = len.try_into().map_err(|_| {
			Error::new(ErrorKind::Capacity, "Sequence length does not fit in an i64")
		})?;
		self.writer.write_varint(len).map_err(Error::io)?;
		Ok(())
	}
}

impl<W: Write> Encoder for BinaryEncoder<W> {
	fn write_null(&mut self) -> Result<(), Error> {
		Ok(())
	}

	fn write_boolean(&mut self, v: bool) -> Result<(), Error> {
		self.writer.write_all(&[v as u8]).map_err(Error::io)
	}

	fn write_int(&mut self, v: i32) -> Result<(), Error> {
		self.writer.write_varint(v).map_err(Error::io)?;
		Ok(())
	}

	fn write_long(&mut self, v: i64) -> Result<(), Error> {
		self.writer.write_varint(v).map_err(Error::io)?;
		Ok(())
	}

	fn write_float(&mut self, v: f32) -> Result<(), Error> {
		self.writer.write_all(&v.to_le_bytes()).map_err(Error::io)
	}

	fn write_double(&mut self, v: f64) -> Result<(), Error> {
		self.writer.write_all(&v.to_le_bytes()).map_err(Error::io)
	}

	fn write_bytes(&mut self, v: &[u8]) -> Result<(), Error> {
		self.write_len(v.len())?;
		self.writer.write_all(v).map_err(Error::io)
	}

	fn write_string(&mut self, v: &str) -> Result<(), Error> {
		self.write_bytes(v.as_bytes())
	}

	fn write_fixed(&mut self, v: &[u8]) -> Result<(), Error> {
		self.writer.write_all(v).map_err(Error::io)
	}

	fn write_enum(&mut self, ordinal: usize, _symbol: &str) -> Result<(), Error> {
		self.write_len(ordinal)
	}

	fn write_union_start(
		&mut self,
		index: usize,
		_label: &str,
		_unwrapped: bool,
	) -> Result<(), Error> {
		self.write_len(index)
	}

	fn write_array_start(&mut self, len: usize) -> Result<(), Error> {
		if len > 0 {
			self.write_len(len)?;
		}
		Ok(())
	}

	fn write_array_end(&mut self) -> Result<(), Error> {
		self.writer.write_varint(0i64).map_err(Error::io)?;
		Ok(())
	}

	fn write_map_start(&mut self, len: usize) -> Result<(), Error> {
		self.write_array_start(len)
	}

	fn write_map_key(&mut self, key: &str) -> Result<(), Error> {
		self.write_string(key)
	}

	fn write_map_end(&mut self) -> Result<(), Error> {
		self.write_array_end()
	}
}
