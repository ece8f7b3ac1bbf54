use super::{
	number_to_bytes, string_to_bytes, tokenize, tokenize_bounded, JsonMode, JsonToken,
	DEFAULT_CAPTURE_MAX_DEPTH, FIELD_CAPTURE_MAX_DEPTH,
};

use crate::{
	de::Decoder,
	grammar::{
		compile_json,
		parser::{Advanced, Parser, Popped},
		Grammar, Symbol, SymbolId, Terminal,
	},
	schema::{Record, RecordField, Schema},
	Error, ErrorKind,
};

use std::collections::HashMap;

/// The compiled JSON grammar of a reader schema
///
/// Build once per schema and share across [`JsonDecoder`]s.
pub struct JsonGrammar {
	pub(crate) grammar: Grammar,
}

impl JsonGrammar {
	/// Compile the JSON grammar of `schema`
	pub fn new(schema: &Schema) -> Self {
		Self {
			grammar: compile_json(schema),
		}
	}
}

/// Decodes the extended JSON projection of an Avro datum
///
/// Records decode regardless of field order: out-of-order fields are
/// captured into a per-record reorder buffer and spliced back in when the
/// reader reaches their declaration slot; fields missing from the input
/// materialize from their reader-side default. Unknown fields fail in
/// [`Strict`](JsonMode::Strict) mode and are dropped in
/// [`Lenient`](JsonMode::Lenient) mode.
pub struct JsonDecoder<'g> {
	parser: Parser<'g>,
	mode: JsonMode,
	/// Innermost redirected input last (captured field subtree or
	/// materialized default); the base document is always at the bottom
	inputs: Vec<TokenCursor>,
	/// One buffer per open record scope
	reorder: Vec<ReorderBuffer>,
}

struct TokenCursor {
	tokens: Vec<JsonToken>,
	pos: usize,
	/// Whether this cursor was spliced in for a single field (and must be
	/// dropped when that field ends)
	redirected: bool,
}

impl TokenCursor {
	fn peek(&self) -> Option<&JsonToken> {
		self.tokens.get(self.pos)
	}
}

#[derive(Default)]
struct ReorderBuffer {
	saved: HashMap<String, Vec<JsonToken>>,
}

impl<'g> JsonDecoder<'g> {
	/// Construct a `JsonDecoder` over JSON text
	pub fn new(grammar: &'g JsonGrammar, json: &str, mode: JsonMode) -> Result<Self, Error> {
		let value: serde_json::Value = serde_json::from_str(json).map_err(|e| {
			Error::custom(ErrorKind::Malformed, format_args!("Invalid JSON input: {e}"))
		})?;
		Ok(Self::from_value(grammar, &value, mode))
	}

	/// Construct a `JsonDecoder` over an already-parsed JSON tree
	pub fn from_value(grammar: &'g JsonGrammar, value: &serde_json::Value, mode: JsonMode) -> Self {
		let mut tokens = Vec::new();
		tokenize(value, &mut tokens);
		Self {
			parser: Parser::new(&grammar.grammar),
			mode,
			inputs: vec![TokenCursor {
				tokens,
				pos: 0,
				redirected: false,
			}],
			reorder: Vec::new(),
		}
	}

	fn cursor(&mut self) -> &mut TokenCursor {
		self.inputs.last_mut().expect("base cursor always present")
	}

	fn peek_token(&mut self) -> Option<&JsonToken> {
		self.inputs.last().expect("base cursor always present").peek()
	}

	fn next_token(&mut self) -> Result<JsonToken, Error> {
		let cursor = self.cursor();
		let token = cursor.tokens.get(cursor.pos).cloned().ok_or_else(|| {
			Error::new(ErrorKind::Malformed, "Unexpected end of JSON input")
		})?;
		cursor.pos += 1;
		Ok(token)
	}

	fn advance(&mut self, expected: Terminal) -> Result<(), Error> {
		loop {
			match self.parser.advance(expected)? {
				Advanced::Terminal(_) => return Ok(()),
				Advanced::Action(action) => self.perform(action)?,
			}
		}
	}

	fn perform(&mut self, action: SymbolId) -> Result<(), Error> {
		match &self.parser.grammar()[action] {
			Symbol::UnionEnd => match self.next_token()? {
				JsonToken::ObjectEnd => Ok(()),
				other => Err(Error::custom(
					ErrorKind::UnionBranch,
					format_args!("Expected closing brace of union tag object, found {other:?}"),
				)),
			},
			other => Err(Error::custom(
				ErrorKind::TypeMismatch,
				format_args!("Unexpected symbol in JSON grammar: {other:?}"),
			)),
		}
	}

	/// Read one complete JSON value from the input into `out`
	fn capture_value(&mut self, out: &mut Vec<JsonToken>, max_depth: usize) -> Result<(), Error> {
		let mut depth = 0usize;
		loop {
			let token = self.next_token()?;
			match &token {
				JsonToken::ObjectStart | JsonToken::ArrayStart => {
					depth += 1;
					if depth > max_depth {
						return Err(Error::new(
							ErrorKind::Capacity,
							"Unread JSON field is nested deeper than the reorder buffer allows",
						));
					}
				}
				JsonToken::ObjectEnd | JsonToken::ArrayEnd => {
					depth = depth.checked_sub(1).ok_or_else(|| {
						Error::new(ErrorKind::Malformed, "Unbalanced JSON input")
					})?;
				}
				_ => {}
			}
			out.push(token);
			if depth == 0 {
				return Ok(());
			}
		}
	}

	/// Rebuild a JSON tree by consuming one value from the input
	fn value_from_input(&mut self) -> Result<serde_json::Value, Error> {
		Ok(match self.next_token()? {
			JsonToken::Null => serde_json::Value::Null,
			JsonToken::Bool(b) => serde_json::Value::Bool(b),
			JsonToken::Number(n) => serde_json::Value::Number(n),
			JsonToken::String(s) => serde_json::Value::String(s),
			JsonToken::ArrayStart => {
				let mut items = Vec::new();
				loop {
					if matches!(self.peek_token(), Some(JsonToken::ArrayEnd)) {
						self.next_token()?;
						break;
					}
					items.push(self.value_from_input()?);
				}
				serde_json::Value::Array(items)
			}
			JsonToken::ObjectStart => {
				let mut entries = serde_json::Map::new();
				loop {
					match self.next_token()? {
						JsonToken::ObjectEnd => break,
						JsonToken::FieldName(name) => {
							let value = self.value_from_input()?;
							entries.insert(name, value);
						}
						other => {
							return Err(Error::custom(
								ErrorKind::Malformed,
								format_args!("Expected field name in JSON object, found {other:?}"),
							));
						}
					}
				}
				serde_json::Value::Object(entries)
			}
			other @ (JsonToken::ObjectEnd | JsonToken::ArrayEnd | JsonToken::FieldName(_)) => {
				return Err(Error::custom(
					ErrorKind::Malformed,
					format_args!("Expected a JSON value, found {other:?}"),
				));
			}
		})
	}

	/// Position the input at the named field, per the reorder protocol:
	/// replay a previously-captured subtree, else walk forward (capturing
	/// what we pass over), else materialize the reader default
	fn seek_field(
		&mut self,
		name: &str,
		default: Option<&serde_json::Value>,
	) -> Result<(), Error> {
		if let Some(tokens) = self
			.reorder
			.last_mut()
			.and_then(|buffer| buffer.saved.remove(name))
		{
			self.inputs.push(TokenCursor {
				tokens,
				pos: 0,
				redirected: true,
			});
			return Ok(());
		}
		loop {
			match self.peek_token() {
				Some(JsonToken::FieldName(field)) if field == name => {
					self.next_token()?;
					return Ok(());
				}
				Some(JsonToken::FieldName(_)) => {
					let JsonToken::FieldName(field) = self.next_token()? else {
						unreachable!("just peeked a field name");
					};
					let mut captured = Vec::new();
					self.capture_value(&mut captured, FIELD_CAPTURE_MAX_DEPTH)?;
					self.reorder
						.last_mut()
						.ok_or_else(|| {
							Error::new(ErrorKind::TypeMismatch, "Field read outside of a record scope")
						})?
						.saved
						.insert(field, captured);
				}
				_ => break,
			}
		}
		match default {
			Some(default) => {
				let mut tokens = Vec::new();
				tokenize_bounded(default, &mut tokens, DEFAULT_CAPTURE_MAX_DEPTH)?;
				self.inputs.push(TokenCursor {
					tokens,
					pos: 0,
					redirected: true,
				});
				Ok(())
			}
			None => Err(Error::custom(
				ErrorKind::MissingField,
				format_args!("Field {name:?} is missing from the JSON input and declares no default"),
			)),
		}
	}
}

impl<'g> Decoder for JsonDecoder<'g> {
	fn read_null(&mut self) -> Result<(), Error> {
		self.advance(Terminal::Null)?;
		match self.next_token()? {
			JsonToken::Null => Ok(()),
			other => Err(Error::custom(
				ErrorKind::TypeMismatch,
				format_args!("Expected null, found {other:?}"),
			)),
		}
	}

	fn read_boolean(&mut self) -> Result<bool, Error> {
		self.advance(Terminal::Boolean)?;
		match self.next_token()? {
			JsonToken::Bool(b) => Ok(b),
			other => Err(Error::custom(
				ErrorKind::TypeMismatch,
				format_args!("Expected a boolean, found {other:?}"),
			)),
		}
	}

	fn read_int(&mut self) -> Result<i32, Error> {
		self.advance(Terminal::Int)?;
		match self.next_token()? {
			JsonToken::Number(n) => n
				.as_i64()
				.and_then(|v| i32::try_from(v).ok())
				.ok_or_else(|| {
					Error::custom(
						ErrorKind::TypeMismatch,
						format_args!("Number {n} does not fit in an int"),
					)
				}),
			other => Err(Error::custom(
				ErrorKind::TypeMismatch,
				format_args!("Expected a number, found {other:?}"),
			)),
		}
	}

	fn read_long(&mut self) -> Result<i64, Error> {
		self.advance(Terminal::Long)?;
		match self.next_token()? {
			JsonToken::Number(n) => n.as_i64().ok_or_else(|| {
				Error::custom(
					ErrorKind::TypeMismatch,
					format_args!("Number {n} does not fit in a long"),
				)
			}),
			other => Err(Error::custom(
				ErrorKind::TypeMismatch,
				format_args!("Expected a number, found {other:?}"),
			)),
		}
	}

	fn read_float(&mut self) -> Result<f32, Error> {
		self.advance(Terminal::Float)?;
		match self.next_token()? {
			JsonToken::Number(n) => Ok(n.as_f64().unwrap_or(f64::NAN) as f32),
			other => Err(Error::custom(
				ErrorKind::TypeMismatch,
				format_args!("Expected a number, found {other:?}"),
			)),
		}
	}

	fn read_double(&mut self) -> Result<f64, Error> {
		self.advance(Terminal::Double)?;
		match self.next_token()? {
			JsonToken::Number(n) => Ok(n.as_f64().unwrap_or(f64::NAN)),
			other => Err(Error::custom(
				ErrorKind::TypeMismatch,
				format_args!("Expected a number, found {other:?}"),
			)),
		}
	}

	fn read_bytes(&mut self) -> Result<Vec<u8>, Error> {
		self.advance(Terminal::Bytes)?;
		match self.next_token()? {
			// Raw bytes in ISO-8859-1: one char per byte
			JsonToken::String(s) => string_to_bytes(&s).ok_or_else(|| {
				Error::new(
					ErrorKind::Malformed,
					"Bytes spelled as a JSON string may only contain chars up to U+00FF",
				)
			}),
			// Extended spellings: integers and decimal numbers become
			// two's-complement unscaled-value bytes
			JsonToken::Number(n) => number_to_bytes(&n),
			other => Err(Error::custom(
				ErrorKind::TypeMismatch,
				format_args!("Expected a string or number for bytes, found {other:?}"),
			)),
		}
	}

	fn read_string(&mut self) -> Result<String, Error> {
		self.advance(Terminal::String)?;
		match self.next_token()? {
			JsonToken::String(s) => Ok(s),
			other => Err(Error::custom(
				ErrorKind::TypeMismatch,
				format_args!("Expected a string, found {other:?}"),
			)),
		}
	}

	fn read_fixed(&mut self, size: usize) -> Result<Vec<u8>, Error> {
		self.advance(Terminal::Fixed(size))?;
		match self.next_token()? {
			JsonToken::String(s) => {
				let bytes = string_to_bytes(&s).ok_or_else(|| {
					Error::new(
						ErrorKind::Malformed,
						"Fixed spelled as a JSON string may only contain chars up to U+00FF",
					)
				})?;
				if bytes.len() != size {
					return Err(Error::custom(
						ErrorKind::Malformed,
						format_args!("Fixed value has {} bytes, schema declares {size}", bytes.len()),
					));
				}
				Ok(bytes)
			}
			other => Err(Error::custom(
				ErrorKind::TypeMismatch,
				format_args!("Expected a string for fixed, found {other:?}"),
			)),
		}
	}

	fn read_enum(&mut self) -> Result<usize, Error> {
		loop {
			match self.parser.pop_next()? {
				Popped::Action(action) => {
					if let Symbol::EnumLabels { symbols } = &self.parser.grammar()[action] {
						return match self.next_token()? {
							JsonToken::String(s) => {
								symbols.iter().position(|symbol| *symbol == s).ok_or_else(|| {
									Error::custom(
										ErrorKind::Malformed,
										format_args!("Unknown enum symbol {s:?}"),
									)
								})
							}
							other => Err(Error::custom(
								ErrorKind::TypeMismatch,
								format_args!("Expected an enum symbol string, found {other:?}"),
							)),
						};
					}
					self.perform(action)?;
				}
				_ => {
					return Err(Error::new(
						ErrorKind::TypeMismatch,
						"Expected an enum in the JSON grammar",
					));
				}
			}
		}
	}

	fn read_union_index(&mut self) -> Result<usize, Error> {
		loop {
			match self.parser.pop_next()? {
				Popped::Action(action) => self.perform(action)?,
				Popped::Alternative(id) => {
					let Symbol::Alternative {
						labels,
						branches,
						union_end,
					} = &self.parser.grammar()[id]
					else {
						unreachable!("pop_next only surfaces alternatives for Alternative symbols");
					};
					// Branch choice is driven by the current token:
					// - `null` takes the null branch;
					// - with exactly one non-null branch the value is
					//   unwrapped, so anything else takes that branch;
					// - otherwise the value must be a `{"label": value}`
					//   tag object.
					if matches!(self.peek_token(), Some(JsonToken::Null)) {
						let branch = labels.iter().position(|l| l == "null").ok_or_else(|| {
							Error::new(
								ErrorKind::UnionBranch,
								"JSON null does not match any union branch",
							)
						})?;
						self.parser.push(branches[branch]);
						return Ok(branch);
					}
					let mut non_null = labels.iter().enumerate().filter(|(_, l)| *l != "null");
					let first_non_null = non_null.next();
					if let (Some((branch, _)), None) = (first_non_null, non_null.next()) {
						self.parser.push(branches[branch]);
						return Ok(branch);
					}
					match self.next_token()? {
						JsonToken::ObjectStart => {}
						other => {
							return Err(Error::custom(
								ErrorKind::UnionBranch,
								format_args!(
									"Expected a union tag object {{\"<branch>\": value}}, found {other:?}"
								),
							));
						}
					}
					let tag = match self.next_token()? {
						JsonToken::FieldName(tag) => tag,
						other => {
							return Err(Error::custom(
								ErrorKind::UnionBranch,
								format_args!("Expected a union branch tag, found {other:?}"),
							));
						}
					};
					let branch = labels
						.iter()
						.position(|label| {
							*label == tag
								|| label
									.rsplit_once('.')
									.is_some_and(|(_, simple)| simple == tag)
						})
						.ok_or_else(|| {
							Error::custom(
								ErrorKind::UnionBranch,
								format_args!("Union tag {tag:?} does not name any branch"),
							)
						})?;
					self.parser.push(*union_end);
					self.parser.push(branches[branch]);
					return Ok(branch);
				}
				Popped::Terminal(_) => {
					return Err(Error::new(
						ErrorKind::TypeMismatch,
						"Expected a union in the JSON grammar",
					));
				}
			}
		}
	}

	fn read_array_start(&mut self) -> Result<(), Error> {
		self.advance(Terminal::ArrayStart)?;
		match self.next_token()? {
			JsonToken::ArrayStart => Ok(()),
			other => Err(Error::custom(
				ErrorKind::TypeMismatch,
				format_args!("Expected a JSON array, found {other:?}"),
			)),
		}
	}

	fn read_array_next(&mut self) -> Result<bool, Error> {
		if matches!(self.peek_token(), Some(JsonToken::ArrayEnd)) {
			self.next_token()?;
			self.advance(Terminal::ArrayEnd)?;
			Ok(false)
		} else {
			Ok(true)
		}
	}

	fn read_map_start(&mut self) -> Result<(), Error> {
		self.advance(Terminal::MapStart)?;
		match self.next_token()? {
			JsonToken::ObjectStart => Ok(()),
			other => Err(Error::custom(
				ErrorKind::TypeMismatch,
				format_args!("Expected a JSON object, found {other:?}"),
			)),
		}
	}

	fn read_map_next(&mut self) -> Result<bool, Error> {
		if matches!(self.peek_token(), Some(JsonToken::ObjectEnd)) {
			self.next_token()?;
			self.advance(Terminal::MapEnd)?;
			Ok(false)
		} else {
			Ok(true)
		}
	}

	fn read_map_key(&mut self) -> Result<String, Error> {
		self.advance(Terminal::String)?;
		match self.next_token()? {
			JsonToken::FieldName(name) => Ok(name),
			other => Err(Error::custom(
				ErrorKind::TypeMismatch,
				format_args!("Expected a map key, found {other:?}"),
			)),
		}
	}

	fn read_record_start(&mut self) -> Result<(), Error> {
		self.advance(Terminal::RecordStart)?;
		match self.next_token()? {
			JsonToken::ObjectStart => {
				self.reorder.push(ReorderBuffer::default());
				Ok(())
			}
			other => Err(Error::custom(
				ErrorKind::TypeMismatch,
				format_args!("Expected a JSON object for a record, found {other:?}"),
			)),
		}
	}

	fn read_field_order(&mut self, record: &Record) -> Result<Vec<usize>, Error> {
		// The reorder buffer repositions the input per field, so the reader
		// always observes declaration order
		Ok((0..record.fields.len()).collect())
	}

	fn read_field_start(&mut self, field: &RecordField) -> Result<(), Error> {
		let _ = field;
		loop {
			match self.parser.pop_next()? {
				Popped::Action(action) => {
					if let Symbol::FieldAdjust { name, default, .. } =
						&self.parser.grammar()[action]
					{
						return self.seek_field(name, default.as_ref());
					}
					self.perform(action)?;
				}
				_ => {
					return Err(Error::new(
						ErrorKind::TypeMismatch,
						"Expected a record field in the JSON grammar",
					));
				}
			}
		}
	}

	fn read_field_end(&mut self) -> Result<(), Error> {
		self.advance(Terminal::FieldEnd)?;
		if self.inputs.len() > 1 && self.inputs.last().expect("non-empty").redirected {
			self.inputs.pop();
		}
		Ok(())
	}

	fn read_record_end(&mut self) -> Result<(), Error> {
		self.advance(Terminal::RecordEnd)?;
		loop {
			let mode = self.mode;
			match self.peek_token() {
				Some(JsonToken::FieldName(field)) => match mode {
					JsonMode::Strict => {
						return Err(Error::custom(
							ErrorKind::UnknownField,
							format_args!("Unknown field {field:?} in strict JSON mode"),
						));
					}
					JsonMode::Lenient => {
						self.next_token()?;
						let mut discarded = Vec::new();
						self.capture_value(&mut discarded, usize::MAX)?;
					}
				},
				Some(JsonToken::ObjectEnd) => {
					self.next_token()?;
					break;
				}
				other => {
					return Err(Error::custom(
						ErrorKind::Malformed,
						format_args!("Expected end of JSON object, found {other:?}"),
					));
				}
			}
		}
		let buffer = self.reorder.pop().expect("record end without matching start");
		if self.mode == JsonMode::Strict {
			if let Some(unknown) = buffer.saved.into_keys().next() {
				return Err(Error::custom(
					ErrorKind::UnknownField,
					format_args!("Unknown field {unknown:?} in strict JSON mode"),
				));
			}
		}
		Ok(())
	}

	fn read_raw_json(&mut self) -> Result<Option<serde_json::Value>, Error> {
		loop {
			match self.parser.pop_value_symbol()? {
				Advanced::Terminal(_) => break,
				Advanced::Action(action) => self.perform(action)?,
			}
		}
		self.value_from_input().map(Some)
	}

	fn drain(&mut self) -> Result<(), Error> {
		while let Some(action) = self.parser.pop_trailing_action()? {
			self.perform(action)?;
		}
		Ok(())
	}
}
