//! Fuses a writer schema with a reader schema into a single resolution
//! grammar
//!
//! The grammar's terminals match the writer's wire order, while its actions
//! surface reader-shaped values: field reordering, writer-only skips,
//! reader-side default injection, primitive promotion, enum remapping and
//! union re-tagging all become symbols the resolving decoder performs.
//!
//! Mismatches do not fail grammar generation: they compile to error actions
//! that only fire if the writer actually uses that part of the schema (a
//! writer union branch the reader cannot represent is fine as long as no
//! datum takes it).

use super::{compile_binary, Grammar, GrammarBuilder, Symbol, SymbolId, Terminal};

use crate::{
	schema::{Schema, SchemaKey, SchemaType, Union},
	ser::{BinaryEncoder, Encoder},
	Error, ErrorKind,
};

use std::{
	collections::HashMap,
	sync::{Arc, Mutex, OnceLock},
};

/// Obtain the resolution grammar for a `(writer, reader)` pair
///
/// Grammars are interned process-wide, keyed by the pair of schema
/// fingerprints: resolving the same pair twice reuses the compiled grammar.
pub(crate) fn resolution_grammar(writer: &Schema, reader: &Schema) -> Result<Arc<Grammar>, Error> {
	static CACHE: OnceLock<Mutex<HashMap<(u64, u64), Arc<Grammar>>>> = OnceLock::new();
	let cache = CACHE.get_or_init(Default::default);
	let cache_key = (writer.fingerprint_u64(), reader.fingerprint_u64());
	if let Some(grammar) = cache.lock().expect("resolution cache poisoned").get(&cache_key) {
		return Ok(Arc::clone(grammar));
	}
	let grammar = Arc::new(generate(writer, reader)?);
	cache
		.lock()
		.expect("resolution cache poisoned")
		.insert(cache_key, Arc::clone(&grammar));
	Ok(grammar)
}

fn generate(writer: &Schema, reader: &Schema) -> Result<Grammar, Error> {
	let mut builder = GrammarBuilder::new();
	let mut resolver = Resolver {
		writer,
		reader,
		memo: HashMap::new(),
		identity_memo: HashMap::new(),
		skip_memo: HashMap::new(),
	};
	let root = resolver.resolve(&mut builder, SchemaKey::root(), SchemaKey::root(), false)?;
	Ok(builder.finish(root))
}

/// Memoized pair-walker on `(writer node, reader node)`
///
/// Cycles are handled by reserving (and memoizing) a forward slot before
/// recursing, then patching it once the production is known - the same
/// trick the schema parser uses for self-referencing records.
struct Resolver<'a> {
	writer: &'a Schema,
	reader: &'a Schema,
	memo: HashMap<(usize, usize), SymbolId>,
	/// Reader-resolved-against-itself productions, used for spliced
	/// defaults (kept separate: node indices of the two schemas overlap)
	identity_memo: HashMap<(usize, usize), SymbolId>,
	/// Writer-only wire shapes for skip actions
	skip_memo: HashMap<usize, SymbolId>,
}

impl<'a> Resolver<'a> {
	/// `identity` selects resolving the reader against itself (for spliced
	/// defaults) instead of the writer against the reader
	fn resolve(
		&mut self,
		b: &mut GrammarBuilder,
		w: SchemaKey,
		r: SchemaKey,
		identity: bool,
	) -> Result<SymbolId, Error> {
		let memo_key = (w.idx(), r.idx());
		let memo = if identity {
			&self.identity_memo
		} else {
			&self.memo
		};
		if let Some(&done) = memo.get(&memo_key) {
			return Ok(done);
		}
		let ws: &Schema = if identity { self.reader } else { self.writer };
		let rs: &Schema = self.reader;

		macro_rules! memoize {
			($id: expr) => {{
				let id = $id;
				if identity {
					self.identity_memo.insert(memo_key, id);
				} else {
					self.memo.insert(memo_key, id);
				}
				id
			}};
		}

		Ok(match (&ws[w].type_, &rs[r].type_) {
			// Rule: a writer union reads its index from the wire, then
			// continues with that branch resolved against the whole reader
			(SchemaType::Union(writer_union), _) => {
				let id = memoize!(b.forward());
				let branches = writer_union
					.variants
					.iter()
					.map(|&wv| self.resolve(b, wv, r, identity))
					.collect::<Result<_, Error>>()?;
				b.patch(id, Symbol::WriterUnion { branches });
				id
			}
			// Rule: a non-union writer against a reader union surfaces the
			// best-matching reader branch
			(writer_type, SchemaType::Union(reader_union)) => {
				let id = memoize!(b.forward());
				match best_branch(writer_type, rs, reader_union) {
					Some(reader_branch) => {
						let variant = reader_union.variants[reader_branch];
						let production = self.resolve(b, w, variant, identity)?;
						b.patch(
							id,
							Symbol::UnionAdjust {
								reader_branch,
								production,
							},
						);
					}
					None => {
						b.patch(
							id,
							Symbol::ErrorAction {
								kind: ErrorKind::TypeMismatch,
								message: format!(
									"Found {}, expecting a matching union branch on the reader side",
									ws[w].type_.type_label()
								),
							},
						);
					}
				}
				id
			}
			(writer_type, reader_type) => match (writer_type, reader_type) {
				// Identical primitives
				(SchemaType::Null, SchemaType::Null) => {
					memoize!(b.push(Symbol::Terminal(Terminal::Null)))
				}
				(SchemaType::Boolean, SchemaType::Boolean) => {
					memoize!(b.push(Symbol::Terminal(Terminal::Boolean)))
				}
				(SchemaType::Int, SchemaType::Int) => {
					memoize!(b.push(Symbol::Terminal(Terminal::Int)))
				}
				(SchemaType::Long, SchemaType::Long) => {
					memoize!(b.push(Symbol::Terminal(Terminal::Long)))
				}
				(SchemaType::Float, SchemaType::Float) => {
					memoize!(b.push(Symbol::Terminal(Terminal::Float)))
				}
				(SchemaType::Double, SchemaType::Double) => {
					memoize!(b.push(Symbol::Terminal(Terminal::Double)))
				}
				(SchemaType::Bytes, SchemaType::Bytes) => {
					memoize!(b.push(Symbol::Terminal(Terminal::Bytes)))
				}
				(SchemaType::String, SchemaType::String) => {
					memoize!(b.push(Symbol::Terminal(Terminal::String)))
				}
				// Promotions: the reader widens what the writer put on the
				// wire
				(_, _) if promotion(writer_type, reader_type).is_some() => {
					let (writer_terminal, reader_terminal) =
						promotion(writer_type, reader_type).expect("checked by guard");
					memoize!(b.push(Symbol::Resolve {
						writer: writer_terminal,
						reader: reader_terminal,
					}))
				}
				(SchemaType::Fixed(writer_fixed), SchemaType::Fixed(reader_fixed)) => {
					if !reader_fixed
						.name
						.matches(&writer_fixed.name, &reader_fixed.aliases)
					{
						memoize!(mismatch(b, "fixed names do not match", writer_type, reader_type))
					} else if writer_fixed.size != reader_fixed.size {
						memoize!(b.push(Symbol::ErrorAction {
							kind: ErrorKind::TypeMismatch,
							message: format!(
								"Fixed {:?} sizes do not match: writer {}, reader {}",
								reader_fixed.name,
								writer_fixed.size,
								reader_fixed.size
							),
						}))
					} else {
						memoize!(b.push(Symbol::Terminal(Terminal::Fixed(reader_fixed.size))))
					}
				}
				(SchemaType::Enum(writer_enum), SchemaType::Enum(reader_enum)) => {
					if !reader_enum
						.name
						.matches(&writer_enum.name, &reader_enum.aliases)
					{
						memoize!(mismatch(b, "enum names do not match", writer_type, reader_type))
					} else {
						// Aliases are consulted via the name match above; the
						// reader `default` symbol only covers writer symbols
						// the reader does not declare at all
						let default_ordinal = reader_enum
							.default
							.as_deref()
							.and_then(|d| reader_enum.ordinal_of(d));
						let mapping = writer_enum
							.symbols
							.iter()
							.map(|symbol| reader_enum.ordinal_of(symbol).or(default_ordinal))
							.collect();
						memoize!(b.push(Symbol::EnumAdjust {
							mapping,
							writer_symbols: writer_enum.symbols.clone(),
						}))
					}
				}
				(SchemaType::Array(writer_array), SchemaType::Array(reader_array)) => {
					let id = memoize!(b.forward());
					let start = b.push(Symbol::Terminal(Terminal::ArrayStart));
					let item = self.resolve(b, writer_array.items, reader_array.items, identity)?;
					let repeater = b.push(Symbol::Repeater {
						end: Terminal::ArrayEnd,
						production: vec![item],
					});
					b.patch(id, Symbol::Sequence(vec![start, repeater]));
					id
				}
				(SchemaType::Map(writer_map), SchemaType::Map(reader_map)) => {
					let id = memoize!(b.forward());
					let start = b.push(Symbol::Terminal(Terminal::MapStart));
					let map_key = b.push(Symbol::Terminal(Terminal::String));
					let value = self.resolve(b, writer_map.values, reader_map.values, identity)?;
					let repeater = b.push(Symbol::Repeater {
						end: Terminal::MapEnd,
						production: vec![map_key, value],
					});
					b.patch(id, Symbol::Sequence(vec![start, repeater]));
					id
				}
				(SchemaType::Record(_), SchemaType::Record(_)) => {
					self.resolve_records(b, w, r, identity)?
				}
				(writer_type, reader_type) => {
					memoize!(mismatch(b, "schemas do not match", writer_type, reader_type))
				}
			},
		})
	}

	fn resolve_records(
		&mut self,
		b: &mut GrammarBuilder,
		w: SchemaKey,
		r: SchemaKey,
		identity: bool,
	) -> Result<SymbolId, Error> {
		let memo_key = (w.idx(), r.idx());
		let ws: &Schema = if identity { self.reader } else { self.writer };
		let rs: &Schema = self.reader;
		let id = b.forward();
		if identity {
			self.identity_memo.insert(memo_key, id);
		} else {
			self.memo.insert(memo_key, id);
		}

		let (SchemaType::Record(writer_record), SchemaType::Record(reader_record)) =
			(&ws[w].type_, &rs[r].type_)
		else {
			unreachable!("checked by caller");
		};

		if !reader_record
			.name
			.matches(&writer_record.name, &reader_record.aliases)
		{
			b.patch(
				id,
				Symbol::ErrorAction {
					kind: ErrorKind::TypeMismatch,
					message: format!(
						"Record names do not match: found {:?}, expecting {:?}",
						writer_record.name, reader_record.name
					),
				},
			);
			return Ok(id);
		}

		// Writer fields in writer order: matched ones read in place (with
		// the reader slot pinned), unmatched ones skip
		let mut production: Vec<SymbolId> = Vec::new();
		let mut order: Vec<usize> = Vec::new();
		let mut reader_matched = vec![false; reader_record.fields.len()];
		let writer_fields = &writer_record.fields;
		let reader_fields = &reader_record.fields;

		for writer_field in writer_fields {
			let matched = reader_fields.iter().position(|reader_field| {
				reader_field.name == writer_field.name
					|| reader_field.aliases.iter().any(|a| *a == writer_field.name)
			});
			match matched {
				Some(reader_idx) => {
					let reader_field = &reader_fields[reader_idx];
					reader_matched[reader_idx] = true;
					order.push(reader_field.position);
					let adjust = b.push(Symbol::FieldAdjust {
						name: reader_field.name.clone(),
						position: reader_field.position,
						default: None,
					});
					production.push(adjust);
					production.push(self.resolve(b, writer_field.type_, reader_field.type_, identity)?);
				}
				None => {
					let shape = compile_binary(b, ws, writer_field.type_, &mut self.skip_memo);
					production.push(b.push(Symbol::Skip { production: shape }));
				}
			}
		}

		// Reader-only fields read from their spliced default bytes, in
		// reader order, after everything the writer put on the wire
		for (reader_idx, reader_field) in reader_fields.iter().enumerate() {
			if reader_matched[reader_idx] {
				continue;
			}
			let Some(default) = &reader_field.default else {
				b.patch(
					id,
					Symbol::ErrorAction {
						kind: ErrorKind::MissingField,
						message: format!(
							"Reader field {:?} of record {:?} is absent from the writer \
								and declares no default",
							reader_field.name, reader_record.name
						),
					},
				);
				return Ok(id);
			};
			let mut encoder = BinaryEncoder::new(Vec::new());
			encode_default(rs, reader_field.type_, default, &mut encoder)?;
			order.push(reader_field.position);
			production.push(b.push(Symbol::FieldAdjust {
				name: reader_field.name.clone(),
				position: reader_field.position,
				default: None,
			}));
			production.push(b.push(Symbol::DefaultStart {
				bytes: encoder.into_writer(),
			}));
			production.push(self.resolve(b, reader_field.type_, reader_field.type_, true)?);
			production.push(b.push(Symbol::DefaultEnd));
		}

		production.insert(0, b.push(Symbol::FieldOrder { order }));
		b.patch(id, Symbol::Sequence(production));
		Ok(id)
	}
}

fn mismatch(
	b: &mut GrammarBuilder,
	what: &str,
	writer_type: &SchemaType,
	reader_type: &SchemaType,
) -> SymbolId {
	b.push(Symbol::ErrorAction {
		kind: ErrorKind::TypeMismatch,
		message: format!(
			"Cannot resolve schemas ({what}): found {}, expecting {}",
			writer_type.type_label(),
			reader_type.type_label()
		),
	})
}

/// The accepted primitive promotions, as `(writer terminal, reader
/// terminal)`
fn promotion(writer_type: &SchemaType, reader_type: &SchemaType) -> Option<(Terminal, Terminal)> {
	Some(match (writer_type, reader_type) {
		(SchemaType::Int, SchemaType::Long) => (Terminal::Int, Terminal::Long),
		(SchemaType::Int, SchemaType::Float) => (Terminal::Int, Terminal::Float),
		(SchemaType::Int, SchemaType::Double) => (Terminal::Int, Terminal::Double),
		(SchemaType::Long, SchemaType::Float) => (Terminal::Long, Terminal::Float),
		(SchemaType::Long, SchemaType::Double) => (Terminal::Long, Terminal::Double),
		(SchemaType::Float, SchemaType::Double) => (Terminal::Float, Terminal::Double),
		(SchemaType::String, SchemaType::Bytes) => (Terminal::String, Terminal::Bytes),
		(SchemaType::Bytes, SchemaType::String) => (Terminal::Bytes, Terminal::String),
		_ => return None,
	})
}

/// Which reader branch a non-union writer value resolves into: exact
/// name/kind match first, then simple-name match for named types, then
/// anything the writer promotes into
fn best_branch(writer_type: &SchemaType, rs: &Schema, reader_union: &Union) -> Option<usize> {
	let exact = reader_union.variants.iter().position(|&variant| {
		let reader_type = &rs[variant].type_;
		match (writer_type.name(), reader_type.name()) {
			(Some(writer_name), Some(_)) => {
				same_kind(writer_type, reader_type)
					&& reader_type
						.name()
						.expect("checked by match")
						.matches(writer_name, reader_type.aliases())
			}
			(None, None) => same_kind(writer_type, reader_type),
			_ => false,
		}
	});
	exact
		.or_else(|| {
			// Tolerate namespace drift: match named types on the simple name
			reader_union.variants.iter().position(|&variant| {
				let reader_type = &rs[variant].type_;
				match (writer_type.name(), reader_type.name()) {
					(Some(writer_name), Some(reader_name)) => {
						same_kind(writer_type, reader_type) && writer_name.name() == reader_name.name()
					}
					_ => false,
				}
			})
		})
		.or_else(|| {
			reader_union
				.variants
				.iter()
				.position(|&variant| promotion(writer_type, &rs[variant].type_).is_some())
		})
}

fn same_kind(writer_type: &SchemaType, reader_type: &SchemaType) -> bool {
	std::mem::discriminant(writer_type) == std::mem::discriminant(reader_type)
}

/// Encode a reader-side JSON default to Avro binary under the field's
/// schema, so reads splice it in as if the writer had sent it
///
/// A union field's default always corresponds to the union's first branch.
pub(crate) fn encode_default<W: std::io::Write>(
	schema: &Schema,
	key: SchemaKey,
	default: &serde_json::Value,
	encoder: &mut BinaryEncoder<W>,
) -> Result<(), Error> {
	use serde_json::Value as Json;

	let bad_default = |expected: &str| {
		Error::custom(
			ErrorKind::UnresolvedSchema,
			format_args!("Default value is not a valid {expected}: {default}"),
		)
	};

	match (&schema[key].type_, default) {
		(SchemaType::Null, Json::Null) => encoder.write_null(),
		(SchemaType::Boolean, Json::Bool(v)) => encoder.write_boolean(*v),
		(SchemaType::Int, Json::Number(n)) => encoder.write_int(
			n.as_i64()
				.and_then(|v| i32::try_from(v).ok())
				.ok_or_else(|| bad_default("int"))?,
		),
		(SchemaType::Long, Json::Number(n)) => {
			encoder.write_long(n.as_i64().ok_or_else(|| bad_default("long"))?)
		}
		(SchemaType::Float, Json::Number(n)) => {
			encoder.write_float(n.as_f64().ok_or_else(|| bad_default("float"))? as f32)
		}
		(SchemaType::Double, Json::Number(n)) => {
			encoder.write_double(n.as_f64().ok_or_else(|| bad_default("double"))?)
		}
		(SchemaType::Bytes, Json::String(s)) => {
			encoder.write_bytes(&crate::json::string_to_bytes(s).ok_or_else(|| bad_default("bytes"))?)
		}
		(SchemaType::Bytes, Json::Number(n)) => {
			encoder.write_bytes(&crate::json::number_to_bytes(n)?)
		}
		(SchemaType::String, Json::String(s)) => encoder.write_string(s),
		(SchemaType::Fixed(fixed), Json::String(s)) => {
			let bytes = crate::json::string_to_bytes(s).ok_or_else(|| bad_default("fixed"))?;
			if bytes.len() != fixed.size {
				return Err(bad_default("fixed of the declared size"));
			}
			encoder.write_fixed(&bytes)
		}
		(SchemaType::Enum(enum_), Json::String(s)) => {
			let ordinal = enum_.ordinal_of(s).ok_or_else(|| bad_default("enum symbol"))?;
			encoder.write_enum(ordinal, s)
		}
		(SchemaType::Array(array), Json::Array(items)) => {
			encoder.write_array_start(items.len())?;
			for item in items {
				encode_default(schema, array.items, item, encoder)?;
			}
			encoder.write_array_end()
		}
		(SchemaType::Map(map), Json::Object(entries)) => {
			encoder.write_map_start(entries.len())?;
			for (map_key, value) in entries {
				encoder.write_map_key(map_key)?;
				encode_default(schema, map.values, value, encoder)?;
			}
			encoder.write_map_end()
		}
		(SchemaType::Union(union), _) => {
			let &first = union
				.variants
				.first()
				.ok_or_else(|| bad_default("union (the union is empty)"))?;
			encoder.write_union_start(0, schema[first].type_.type_label(), false)?;
			encode_default(schema, first, default, encoder)
		}
		(SchemaType::Record(record), Json::Object(entries)) => {
			encoder.write_record_start()?;
			for field in &record.fields {
				let field_default = entries.get(&field.name).or(field.default.as_ref());
				match field_default {
					Some(value) => encode_default(schema, field.type_, value, encoder)?,
					None => {
						return Err(Error::custom(
							ErrorKind::UnresolvedSchema,
							format_args!(
								"Default record value lacks field {:?} which has no default \
									of its own",
								field.name
							),
						));
					}
				}
			}
			encoder.write_record_end()
		}
		_ => Err(bad_default(schema[key].type_.type_label())),
	}
}
