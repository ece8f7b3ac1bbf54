use super::{
	binary::read_block_len,
	read::{Read, ReadSlice, SliceRead},
	Decoder, DecoderConfig,
};

use crate::{
	grammar::{
		parser::{Advanced, Parser, Popped},
		resolve::resolution_grammar,
		Grammar, Symbol, SymbolId, Terminal,
	},
	schema::{Record, Schema},
	Error, ErrorKind,
};

use std::sync::Arc;

/// The compiled reconciliation of a writer schema with a reader schema
///
/// Cheap to clone; building one for a pair of schemas that was already
/// resolved anywhere in the process reuses the interned grammar.
#[derive(Clone)]
pub struct Resolution {
	grammar: Arc<Grammar>,
	identical: bool,
}

impl Resolution {
	/// Fuse `writer` and `reader` into a resolution usable by
	/// [`ResolvingDecoder`]
	pub fn new(writer: &Schema, reader: &Schema) -> Result<Self, Error> {
		Ok(Self {
			identical: writer.rabin_fingerprint() == reader.rabin_fingerprint(),
			grammar: resolution_grammar(writer, reader)?,
		})
	}

	/// Whether writer and reader have the same canonical form (in which case
	/// plain binary decoding is equivalent and cheaper)
	pub fn schemas_identical(&self) -> bool {
		self.identical
	}
}

/// Decodes Avro binary written with one schema while surfacing values shaped
/// by another
///
/// The wire is consumed in writer order; a [`DatumReader`](super::DatumReader)
/// driving this decoder observes reader-declaration-order fields, spliced
/// defaults for fields the writer never wrote, promoted primitives, and
/// re-tagged unions. Writer-only fields are skipped on the way (using the
/// block byte-size fast path where the writer provided it).
pub struct ResolvingDecoder<'g, R> {
	parser: Parser<'g>,
	reader: R,
	config: DecoderConfig,
	/// Innermost spliced default input last; primitive reads drain these
	/// before touching the wire
	defaults: Vec<SliceRead<'g>>,
	blocks: Vec<BlockState>,
}

#[derive(Clone, Copy, Default)]
struct BlockState {
	remaining: u64,
	total_read: u64,
}

macro_rules! with_input {
	($self: ident, $r: ident => $e: expr) => {
		match $self.defaults.last_mut() {
			Some($r) => $e,
			None => {
				let $r = &mut $self.reader;
				$e
			}
		}
	};
}

impl<'g, 'de, R: ReadSlice<'de>> ResolvingDecoder<'g, R> {
	/// Construct a `ResolvingDecoder` over a [`Read`](super::read::Read),
	/// with the default configuration
	pub fn new(resolution: &'g Resolution, reader: R) -> Self {
		Self::with_config(resolution, reader, DecoderConfig::new())
	}

	/// Construct a `ResolvingDecoder` with the given configuration
	pub fn with_config(resolution: &'g Resolution, reader: R, config: DecoderConfig) -> Self {
		Self {
			parser: Parser::new(&resolution.grammar),
			reader,
			config,
			defaults: Vec::new(),
			blocks: Vec::new(),
		}
	}

	/// Turn the decoder back into the reader it was built from
	pub fn into_reader(self) -> R {
		self.reader
	}

	fn rv<I: integer_encoding::VarInt>(&mut self) -> Result<I, Error> {
		with_input!(self, r => r.read_varint())
	}

	fn rbuf<const N: usize>(&mut self) -> Result<[u8; N], Error> {
		with_input!(self, r => r.read_const_size_buf())
	}

	fn rvec(&mut self, n: usize) -> Result<Vec<u8>, Error> {
		with_input!(self, r => r.read_slice(n, |bytes: &[u8]| Ok(bytes.to_owned())))
	}

	fn rskip(&mut self, n: usize) -> Result<(), Error> {
		with_input!(self, r => r.skip_bytes(n))
	}

	fn read_len(&mut self) -> Result<usize, Error> {
		let len: i64 = self.rv()?;
		len.try_into().map_err(|_| {
			Error::custom(
				ErrorKind::Malformed,
				format_args!("Invalid length in stream: {len}"),
			)
		})
	}

	/// Advance the grammar to `expected`, performing every implicit action
	/// uncovered on the way; returns the writer-side terminal actually on
	/// the wire
	fn advance(&mut self, expected: Terminal) -> Result<Terminal, Error> {
		loop {
			match self.parser.advance(expected)? {
				Advanced::Terminal(actual) => return Ok(actual),
				Advanced::Action(action) => self.perform(action)?,
			}
		}
	}

	/// Perform one implicit action surfaced by the parser
	fn perform(&mut self, action: SymbolId) -> Result<(), Error> {
		let grammar = self.parser.grammar();
		match &grammar[action] {
			// Binary writers serialize fields in declaration order, so
			// positioning at a field is a no-op here; the reader slot is
			// communicated through the field-order action instead
			Symbol::FieldAdjust { .. } | Symbol::FieldOrder { .. } => Ok(()),
			Symbol::Skip { production } => self.skip(*production),
			Symbol::DefaultStart { bytes } => {
				self.defaults.push(SliceRead::new(bytes));
				Ok(())
			}
			Symbol::DefaultEnd => {
				self.defaults.pop();
				Ok(())
			}
			Symbol::WriterUnion { branches } => {
				let index: i64 = self.rv()?;
				let branch = usize::try_from(index)
					.ok()
					.and_then(|i| branches.get(i))
					.ok_or_else(|| {
						Error::custom(
							ErrorKind::Malformed,
							format_args!(
								"Union index {index} is out of bounds for writer union of {} branches",
								branches.len()
							),
						)
					})?;
				self.parser.push(*branch);
				Ok(())
			}
			Symbol::UnionAdjust { .. } => Err(Error::new(
				ErrorKind::TypeMismatch,
				"The reader schema holds a union here - it must be read as one",
			)),
			Symbol::EnumAdjust { .. } => Err(Error::new(
				ErrorKind::TypeMismatch,
				"The reader schema holds an enum here - it must be read as one",
			)),
			other => Err(Error::custom(
				ErrorKind::TypeMismatch,
				format_args!("Unexpected symbol in resolution grammar: {other:?}"),
			)),
		}
	}

	/// Skip one writer-only value, following its wire-shape production
	fn skip(&mut self, symbol: SymbolId) -> Result<(), Error> {
		let grammar = self.parser.grammar();
		let mut stack = vec![symbol];
		while let Some(top) = stack.pop() {
			match &grammar[top] {
				Symbol::Terminal(terminal) => self.skip_terminal(*terminal)?,
				Symbol::Sequence(production) => stack.extend(production.iter().rev()),
				Symbol::Repeater { production, .. } => {
					self.skip_blocks(production)?;
				}
				Symbol::WriterUnion { branches } => {
					let index: i64 = self.rv()?;
					let branch = usize::try_from(index)
						.ok()
						.and_then(|i| branches.get(i))
						.ok_or_else(|| {
							Error::new(ErrorKind::Malformed, "Union index out of bounds while skipping")
						})?;
					stack.push(*branch);
				}
				other => {
					return Err(Error::custom(
						ErrorKind::TypeMismatch,
						format_args!("Unexpected symbol in skip production: {other:?}"),
					));
				}
			}
		}
		Ok(())
	}

	fn skip_terminal(&mut self, terminal: Terminal) -> Result<(), Error> {
		match terminal {
			Terminal::Null | Terminal::ArrayStart | Terminal::MapStart => {}
			Terminal::Boolean => self.rskip(1)?,
			Terminal::Int => {
				let _: i32 = self.rv()?;
			}
			Terminal::Long | Terminal::Enum => {
				let _: i64 = self.rv()?;
			}
			Terminal::Float => self.rskip(4)?,
			Terminal::Double => self.rskip(8)?,
			Terminal::Bytes | Terminal::String => {
				let len = self.read_len()?;
				self.rskip(len)?;
			}
			Terminal::Fixed(size) => self.rskip(size)?,
			Terminal::ArrayEnd
			| Terminal::MapEnd
			| Terminal::RecordStart
			| Terminal::RecordEnd
			| Terminal::FieldEnd => {
				// No bytes on the binary wire
			}
		}
		Ok(())
	}

	/// Skip array/map blocks, using the byte-size fast path when the writer
	/// provided a negative count
	fn skip_blocks(&mut self, production: &[SymbolId]) -> Result<(), Error> {
		loop {
			let len: i64 = self.rv()?;
			if len == 0 {
				return Ok(());
			}
			if len < 0 {
				let byte_size: u64 = self.rv()?;
				let byte_size = usize::try_from(byte_size).map_err(|_| {
					Error::new(ErrorKind::Malformed, "Block byte size does not fit in usize")
				})?;
				self.rskip(byte_size)?;
				continue;
			}
			for _ in 0..len {
				for &item in production {
					self.skip(item)?;
				}
			}
		}
	}

	/// Perform actions left over from the previous value (writer-only
	/// trailing fields to skip, default inputs to restore)
	///
	/// Required before reading a block header: those actions consume wire
	/// bytes that precede the header.
	fn process_pending(&mut self) -> Result<(), Error> {
		while let Some(action) = self.parser.pop_trailing_action()? {
			self.perform(action)?;
		}
		Ok(())
	}

	fn next_in_block(&mut self) -> Result<bool, Error> {
		self.process_pending()?;
		let max_seq_size = self.config.max_seq_size;
		let state = self
			.blocks
			.last_mut()
			.expect("array/map next without matching start");
		if state.remaining == 0 {
			let header = with_input!(self, r => read_block_len(r))?;
			match header {
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
		let state = self.blocks.last_mut().expect("checked above");
		state.remaining -= 1;
		Ok(true)
	}
}

impl<'g, 'de, R: ReadSlice<'de>> Decoder for ResolvingDecoder<'g, R> {
	fn read_null(&mut self) -> Result<(), Error> {
		self.advance(Terminal::Null)?;
		Ok(())
	}

	fn read_boolean(&mut self) -> Result<bool, Error> {
		self.advance(Terminal::Boolean)?;
		match self.rbuf::<1>()?[0] {
			0 => Ok(false),
			1 => Ok(true),
			other => Err(Error::custom(
				ErrorKind::Malformed,
				format_args!("Invalid byte value when decoding boolean: {other}"),
			)),
		}
	}

	fn read_int(&mut self) -> Result<i32, Error> {
		self.advance(Terminal::Int)?;
		self.rv()
	}

	fn read_long(&mut self) -> Result<i64, Error> {
		match self.advance(Terminal::Long)? {
			Terminal::Int => Ok(i64::from(self.rv::<i32>()?)),
			_ => self.rv(),
		}
	}

	fn read_float(&mut self) -> Result<f32, Error> {
		match self.advance(Terminal::Float)? {
			Terminal::Int => Ok(self.rv::<i32>()? as f32),
			Terminal::Long => Ok(self.rv::<i64>()? as f32),
			_ => Ok(f32::from_le_bytes(self.rbuf()?)),
		}
	}

	fn read_double(&mut self) -> Result<f64, Error> {
		match self.advance(Terminal::Double)? {
			Terminal::Int => Ok(f64::from(self.rv::<i32>()?)),
			Terminal::Long => Ok(self.rv::<i64>()? as f64),
			Terminal::Float => Ok(f64::from(f32::from_le_bytes(self.rbuf()?))),
			_ => Ok(f64::from_le_bytes(self.rbuf()?)),
		}
	}

	fn read_bytes(&mut self) -> Result<Vec<u8>, Error> {
		// string -> bytes promotion shares the wire representation
		self.advance(Terminal::Bytes)?;
		let len = self.read_len()?;
		self.rvec(len)
	}

	fn read_string(&mut self) -> Result<String, Error> {
		self.advance(Terminal::String)?;
		let len = self.read_len()?;
		let bytes = self.rvec(len)?;
		String::from_utf8(bytes).map_err(|e| {
			Error::custom(
				ErrorKind::Malformed,
				format_args!("String is not valid UTF-8: {e}"),
			)
		})
	}

	fn read_string_bytes(&mut self) -> Result<Vec<u8>, Error> {
		self.advance(Terminal::String)?;
		let len = self.read_len()?;
		self.rvec(len)
	}

	fn read_fixed(&mut self, size: usize) -> Result<Vec<u8>, Error> {
		self.advance(Terminal::Fixed(size))?;
		self.rvec(size)
	}

	fn read_enum(&mut self) -> Result<usize, Error> {
		loop {
			match self.parser.pop_next()? {
				Popped::Action(action) => {
					if let Symbol::EnumAdjust {
						mapping,
						writer_symbols,
					} = &self.parser.grammar()[action]
					{
						let ordinal: i64 = self.rv()?;
						let entry = usize::try_from(ordinal)
							.ok()
							.and_then(|o| mapping.get(o).map(|m| (o, m)));
						return match entry {
							Some((_, Some(reader_ordinal))) => Ok(*reader_ordinal),
							Some((o, None)) => Err(Error::custom(
								ErrorKind::TypeMismatch,
								format_args!(
									"Writer enum symbol {:?} is unknown to the reader \
										and the reader declares no default",
									writer_symbols[o]
								),
							)),
							None => Err(Error::custom(
								ErrorKind::Malformed,
								format_args!("Enum ordinal {ordinal} is out of bounds"),
							)),
						};
					}
					self.perform(action)?;
				}
				_ => {
					return Err(Error::new(
						ErrorKind::TypeMismatch,
						"Expected an enum in the resolution grammar",
					));
				}
			}
		}
	}

	fn read_union_index(&mut self) -> Result<usize, Error> {
		loop {
			match self.parser.pop_next()? {
				Popped::Action(action) => {
					if let Symbol::UnionAdjust {
						reader_branch,
						production,
					} = &self.parser.grammar()[action]
					{
						let (reader_branch, production) = (*reader_branch, *production);
						self.parser.push(production);
						return Ok(reader_branch);
					}
					self.perform(action)?;
				}
				_ => {
					return Err(Error::new(
						ErrorKind::TypeMismatch,
						"Expected a union in the resolution grammar",
					));
				}
			}
		}
	}

	fn read_array_start(&mut self) -> Result<(), Error> {
		self.advance(Terminal::ArrayStart)?;
		self.blocks.push(BlockState::default());
		Ok(())
	}

	fn read_array_next(&mut self) -> Result<bool, Error> {
		if self.next_in_block()? {
			Ok(true)
		} else {
			self.advance(Terminal::ArrayEnd)?;
			Ok(false)
		}
	}

	fn read_map_start(&mut self) -> Result<(), Error> {
		self.advance(Terminal::MapStart)?;
		self.blocks.push(BlockState::default());
		Ok(())
	}

	fn read_map_next(&mut self) -> Result<bool, Error> {
		if self.next_in_block()? {
			Ok(true)
		} else {
			self.advance(Terminal::MapEnd)?;
			Ok(false)
		}
	}

	fn read_map_key(&mut self) -> Result<String, Error> {
		self.read_string()
	}

	fn read_field_order(&mut self, record: &Record) -> Result<Vec<usize>, Error> {
		let _ = record;
		loop {
			match self.parser.pop_next()? {
				Popped::Action(action) => {
					if let Symbol::FieldOrder { order } = &self.parser.grammar()[action] {
						return Ok(order.clone());
					}
					self.perform(action)?;
				}
				_ => {
					return Err(Error::new(
						ErrorKind::TypeMismatch,
						"Expected a record in the resolution grammar",
					));
				}
			}
		}
	}

	fn drain(&mut self) -> Result<(), Error> {
		self.process_pending()
	}
}
