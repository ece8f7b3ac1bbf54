use super::{
	read::{Read, ReadSlice, SliceRead},
	Decoder, DecoderConfig,
};

use crate::{Error, ErrorKind};

use std::num::NonZeroU64;

/// Decodes the Avro binary format directly, with no schema reconciliation
///
/// Fields arrive in the writer's declaration order, which for this decoder
/// is assumed to be the reader's as well (use
/// [`ResolvingDecoder`](super::ResolvingDecoder) when the writer schema
/// differs).
pub struct BinaryDecoder<R> {
	pub(super) reader: R,
	pub(super) config: DecoderConfig,
	/// One entry per open array/map scope
	blocks: Vec<BlockState>,
}

#[derive(Clone, Copy, Default)]
struct BlockState {
	remaining: u64,
	total_read: u64,
}

impl<'de> BinaryDecoder<SliceRead<'de>> {
	/// Construct a `BinaryDecoder` over an `&[u8]`, with the default
	/// configuration
	pub fn from_slice(slice: &'de [u8]) -> Self {
		Self::with_config(SliceRead::new(slice), DecoderConfig::new())
	}
}

impl<R> BinaryDecoder<R> {
	/// Construct a `BinaryDecoder` over a [`Read`](super::read::Read) with
	/// the given configuration
	pub fn with_config(reader: R, config: DecoderConfig) -> Self {
		Self {
			reader,
			config,
			blocks: Vec::new(),
		}
	}

	/// Turn the decoder back into the reader it was built from
	pub fn into_reader(self) -> R {
		self.reader
	}
}

/// Read one block header: `None` means end of the sequence
///
/// A negative count `-n` announces `n` items followed by the block's byte
/// size, which we drop here (the fast skip path reads it itself).
pub(super) fn read_block_len<'de, R: ReadSlice<'de>>(
	reader: &mut R,
) -> Result<Option<NonZeroU64>, Error> {
	let len: i64 = reader.read_varint()?;
	let res;
	if len < 0 {
		// res = -len, properly handling i64::MIN
		res = u64::from_ne_bytes(len.to_ne_bytes()).wrapping_neg();
		// Drop the number of bytes in the block to properly advance the
		// reader. Since we don't use that value, decode as u64 instead of
		// i64 (skip zigzag decoding)
		let _: u64 = reader.read_varint()?;
	} else {
		res = len as u64;
	}
	Ok(NonZeroU64::new(res))
}

impl<'de, R: ReadSlice<'de>> BinaryDecoder<R> {
	fn next_in_block(&mut self) -> Result<bool, Error> {
		let max_seq_size = self.config.max_seq_size;
		let state = self
			.blocks
			.last_mut()
			.expect("array/map next without matching start");
		if state.remaining == 0 {
			match read_block_len(&mut self.reader)? {
				None => {
					self.blocks.pop();
					return Ok(false);
				}
				Some(new_len) => {
					let total_read = state.total_read.saturating_add(new_len.get());
					if total_read > max_seq_size {
						return Err(Error::new(
							ErrorKind::Capacity,
							"Exceeding max sequence size while decoding",
						));
					}
					state.total_read = total_read;
					state.remaining = new_len.get();
				}
			}
		}
		state.remaining -= 1;
		Ok(true)
	}

	fn read_len(&mut self) -> Result<usize, Error> {
		let len: i64 = self.reader.read_varint()?;
		len.try_into().map_err(|_| {
			Error::custom(
				ErrorKind::Malformed,
				format_args!("Invalid length in stream: {len}"),
			)
		})
	}
}

impl<'de, R: ReadSlice<'de>> Decoder for BinaryDecoder<R> {
	fn read_null(&mut self) -> Result<(), Error> {
		Ok(())
	}

	fn read_boolean(&mut self) -> Result<bool, Error> {
		match self.reader.read_const_size_buf::<1>()?[0] {
			0 => Ok(false),
			1 => Ok(true),
			other => Err(Error::custom(
				ErrorKind::Malformed,
				format_args!("Invalid byte value when decoding boolean: {other}"),
			)),
		}
	}

	fn read_int(&mut self) -> Result<i32, Error> {
		self.reader.read_varint()
	}

	fn read_long(&mut self) -> Result<i64, Error> {
		self.reader.read_varint()
	}

	fn read_float(&mut self) -> Result<f32, Error> {
		Ok(f32::from_le_bytes(self.reader.read_const_size_buf()?))
	}

	fn read_double(&mut self) -> Result<f64, Error> {
		Ok(f64::from_le_bytes(self.reader.read_const_size_buf()?))
	}

	fn read_bytes(&mut self) -> Result<Vec<u8>, Error> {
		let len = self.read_len()?;
		self.reader.read_slice(len, |bytes: &[u8]| Ok(bytes.to_owned()))
	}

	fn read_string(&mut self) -> Result<String, Error> {
		let len = self.read_len()?;
		self.reader.read_slice(len, |bytes: &[u8]| {
			std::str::from_utf8(bytes)
				.map(ToOwned::to_owned)
				.map_err(|e| {
					Error::custom(
						ErrorKind::Malformed,
						format_args!("String is not valid UTF-8: {e}"),
					)
				})
		})
	}

	fn read_string_bytes(&mut self) -> Result<Vec<u8>, Error> {
		// The byte view skips UTF-8 validation entirely
		self.read_bytes()
	}

	fn read_fixed(&mut self, size: usize) -> Result<Vec<u8>, Error> {
		self.reader.read_slice(size, |bytes: &[u8]| Ok(bytes.to_owned()))
	}

	fn read_enum(&mut self) -> Result<usize, Error> {
		let ordinal: i64 = self.reader.read_varint()?;
		ordinal.try_into().map_err(|_| {
			Error::custom(
				ErrorKind::Malformed,
				format_args!("Negative enum ordinal in stream: {ordinal}"),
			)
		})
	}

	fn read_union_index(&mut self) -> Result<usize, Error> {
		let index: i64 = self.reader.read_varint()?;
		index.try_into().map_err(|_| {
			Error::custom(
				ErrorKind::Malformed,
				format_args!("Negative union index in stream: {index}"),
			)
		})
	}

	fn read_array_start(&mut self) -> Result<(), Error> {
		self.blocks.push(BlockState::default());
		Ok(())
	}

	fn read_array_next(&mut self) -> Result<bool, Error> {
		self.next_in_block()
	}

	fn read_map_start(&mut self) -> Result<(), Error> {
		self.blocks.push(BlockState::default());
		Ok(())
	}

	fn read_map_next(&mut self) -> Result<bool, Error> {
		self.next_in_block()
	}

	fn read_map_key(&mut self) -> Result<String, Error> {
		self.read_string()
	}
}
