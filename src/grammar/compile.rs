use super::{Grammar, GrammarBuilder, Symbol, SymbolId, Terminal};

use crate::schema::{Schema, SchemaKey, SchemaType};

use std::collections::HashMap;

/// Compile the wire-shape grammar of the value rooted at `key`
///
/// This describes what the writer put on the wire with no reader-side
/// adjustments: it is what the resolving decoder walks when it has to skip a
/// writer-only value.
///
/// `memo` maps schema node indices to already-compiled symbols so that
/// cyclic record schemas compile to a finite graph: a forward slot is
/// reserved and memoized before recursing, then patched once the production
/// is known.
pub(crate) fn compile_binary(
	builder: &mut GrammarBuilder,
	schema: &Schema,
	key: SchemaKey,
	memo: &mut HashMap<usize, SymbolId>,
) -> SymbolId {
	if let Some(&done) = memo.get(&key.idx()) {
		return done;
	}
	let node = &schema[key];
	match &node.type_ {
		SchemaType::Null => builder.push(Symbol::Terminal(Terminal::Null)),
		SchemaType::Boolean => builder.push(Symbol::Terminal(Terminal::Boolean)),
		SchemaType::Int => builder.push(Symbol::Terminal(Terminal::Int)),
		SchemaType::Long => builder.push(Symbol::Terminal(Terminal::Long)),
		SchemaType::Float => builder.push(Symbol::Terminal(Terminal::Float)),
		SchemaType::Double => builder.push(Symbol::Terminal(Terminal::Double)),
		SchemaType::Bytes => builder.push(Symbol::Terminal(Terminal::Bytes)),
		SchemaType::String => builder.push(Symbol::Terminal(Terminal::String)),
		SchemaType::Fixed(fixed) => builder.push(Symbol::Terminal(Terminal::Fixed(fixed.size))),
		SchemaType::Enum(_) => builder.push(Symbol::Terminal(Terminal::Enum)),
		SchemaType::Array(array) => {
			let id = builder.forward();
			memo.insert(key.idx(), id);
			let start = builder.push(Symbol::Terminal(Terminal::ArrayStart));
			let item = compile_binary(builder, schema, array.items, memo);
			let repeater = builder.push(Symbol::Repeater {
				end: Terminal::ArrayEnd,
				production: vec![item],
			});
			builder.patch(id, Symbol::Sequence(vec![start, repeater]));
			id
		}
		SchemaType::Map(map) => {
			let id = builder.forward();
			memo.insert(key.idx(), id);
			let start = builder.push(Symbol::Terminal(Terminal::MapStart));
			let map_key = builder.push(Symbol::Terminal(Terminal::String));
			let value = compile_binary(builder, schema, map.values, memo);
			let repeater = builder.push(Symbol::Repeater {
				end: Terminal::MapEnd,
				production: vec![map_key, value],
			});
			builder.patch(id, Symbol::Sequence(vec![start, repeater]));
			id
		}
		SchemaType::Union(union) => {
			let id = builder.forward();
			memo.insert(key.idx(), id);
			let branches = union
				.variants
				.iter()
				.map(|&variant| compile_binary(builder, schema, variant, memo))
				.collect();
			builder.patch(id, Symbol::WriterUnion { branches });
			id
		}
		SchemaType::Record(record) => {
			let id = builder.forward();
			memo.insert(key.idx(), id);
			let production = record
				.fields
				.iter()
				.map(|field| compile_binary(builder, schema, field.type_, memo))
				.collect();
			builder.patch(id, Symbol::Sequence(production));
			id
		}
	}
}

/// Compile the JSON grammar of `schema`
///
/// This is a second compilation of the same schema that additionally
/// interleaves the structural tokens of the JSON projection: object
/// begin/end and per-field markers for records, and labeled alternatives
/// for unions. Reader-side field defaults ride on the field markers so the
/// decoder can materialize them when the input lacks the field.
pub(crate) fn compile_json(schema: &Schema) -> Grammar {
	let mut builder = GrammarBuilder::new();
	let mut memo = HashMap::new();
	let root = compile_json_node(&mut builder, schema, SchemaKey::root(), &mut memo);
	builder.finish(root)
}

fn compile_json_node(
	builder: &mut GrammarBuilder,
	schema: &Schema,
	key: SchemaKey,
	memo: &mut HashMap<usize, SymbolId>,
) -> SymbolId {
	if let Some(&done) = memo.get(&key.idx()) {
		return done;
	}
	let node = &schema[key];
	match &node.type_ {
		SchemaType::Null => builder.push(Symbol::Terminal(Terminal::Null)),
		SchemaType::Boolean => builder.push(Symbol::Terminal(Terminal::Boolean)),
		SchemaType::Int => builder.push(Symbol::Terminal(Terminal::Int)),
		SchemaType::Long => builder.push(Symbol::Terminal(Terminal::Long)),
		SchemaType::Float => builder.push(Symbol::Terminal(Terminal::Float)),
		SchemaType::Double => builder.push(Symbol::Terminal(Terminal::Double)),
		SchemaType::Bytes => builder.push(Symbol::Terminal(Terminal::Bytes)),
		SchemaType::String => builder.push(Symbol::Terminal(Terminal::String)),
		SchemaType::Fixed(fixed) => builder.push(Symbol::Terminal(Terminal::Fixed(fixed.size))),
		SchemaType::Enum(enum_) => builder.push(Symbol::EnumLabels {
			symbols: enum_.symbols.clone(),
		}),
		SchemaType::Array(array) => {
			let id = builder.forward();
			memo.insert(key.idx(), id);
			let start = builder.push(Symbol::Terminal(Terminal::ArrayStart));
			let item = compile_json_node(builder, schema, array.items, memo);
			let repeater = builder.push(Symbol::Repeater {
				end: Terminal::ArrayEnd,
				production: vec![item],
			});
			builder.patch(id, Symbol::Sequence(vec![start, repeater]));
			id
		}
		SchemaType::Map(map) => {
			let id = builder.forward();
			memo.insert(key.idx(), id);
			let start = builder.push(Symbol::Terminal(Terminal::MapStart));
			let map_key = builder.push(Symbol::Terminal(Terminal::String));
			let value = compile_json_node(builder, schema, map.values, memo);
			let repeater = builder.push(Symbol::Repeater {
				end: Terminal::MapEnd,
				production: vec![map_key, value],
			});
			builder.patch(id, Symbol::Sequence(vec![start, repeater]));
			id
		}
		SchemaType::Union(union) => {
			let id = builder.forward();
			memo.insert(key.idx(), id);
			let labels = union
				.variants
				.iter()
				.map(|&variant| schema[variant].type_.type_label().to_owned())
				.collect();
			let branches = union
				.variants
				.iter()
				.map(|&variant| compile_json_node(builder, schema, variant, memo))
				.collect();
			let union_end = builder.push(Symbol::UnionEnd);
			builder.patch(
				id,
				Symbol::Alternative {
					labels,
					branches,
					union_end,
				},
			);
			id
		}
		SchemaType::Record(record) => {
			let id = builder.forward();
			memo.insert(key.idx(), id);
			let mut production = Vec::with_capacity(record.fields.len() * 3 + 2);
			production.push(builder.push(Symbol::Terminal(Terminal::RecordStart)));
			for field in &record.fields {
				production.push(builder.push(Symbol::FieldAdjust {
					name: field.name.clone(),
					position: field.position,
					default: field.default.clone(),
				}));
				production.push(compile_json_node(builder, schema, field.type_, memo));
				production.push(builder.push(Symbol::Terminal(Terminal::FieldEnd)));
			}
			production.push(builder.push(Symbol::Terminal(Terminal::RecordEnd)));
			builder.patch(id, Symbol::Sequence(production));
			id
		}
	}
}
