//! The production system that drives the resolving and JSON codecs
//!
//! A schema compiles into a graph of [`Symbol`]s stored in a [`Grammar`]
//! arena (the same index-keyed representation the schema graph itself uses,
//! which is what lets cyclic record schemas compile to a finite grammar).
//! A [`Parser`](parser::Parser) then walks that graph with an explicit
//! stack, matching terminals against what the decoder is asked to read and
//! surfacing implicit actions (skip this writer field, switch to these
//! default bytes, remap this enum ordinal...) back to the owning decoder.
//!
//! The parser itself is purely mechanical: all knowledge about the wire
//! format lives in the symbols and in the decoder that performs the actions.

mod compile;
pub(crate) mod parser;
pub(crate) mod resolve;

pub(crate) use compile::{compile_binary, compile_json};

/// A terminal symbol: something a decoder can be asked to match against the
/// input
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Terminal {
	Null,
	Boolean,
	Int,
	Long,
	Float,
	Double,
	Bytes,
	String,
	/// Raw bytes of the declared size
	Fixed(usize),
	/// An enum ordinal (binary) or symbol string (JSON)
	Enum,
	/// Structural markers interleaved by the JSON grammar
	ArrayStart,
	ArrayEnd,
	MapStart,
	MapEnd,
	RecordStart,
	RecordEnd,
	FieldEnd,
}

impl Terminal {
	pub(crate) fn name(self) -> &'static str {
		match self {
			Terminal::Null => "null",
			Terminal::Boolean => "boolean",
			Terminal::Int => "int",
			Terminal::Long => "long",
			Terminal::Float => "float",
			Terminal::Double => "double",
			Terminal::Bytes => "bytes",
			Terminal::String => "string",
			Terminal::Fixed(_) => "fixed",
			Terminal::Enum => "enum",
			Terminal::ArrayStart => "array-start",
			Terminal::ArrayEnd => "array-end",
			Terminal::MapStart => "map-start",
			Terminal::MapEnd => "map-end",
			Terminal::RecordStart => "record-start",
			Terminal::RecordEnd => "record-end",
			Terminal::FieldEnd => "field-end",
		}
	}
}

/// The location of a [`Symbol`] in a [`Grammar`]
///
/// Symbols are immutable once their grammar is fully compiled, and equality
/// is by identity (two structurally-equal symbols at different indices are
/// distinct).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SymbolId {
	idx: usize,
}

impl std::fmt::Debug for SymbolId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		std::fmt::Debug::fmt(&self.idx, f)
	}
}

/// A node of a compiled grammar
#[derive(Clone, Debug)]
pub(crate) enum Symbol {
	/// Matches the input directly
	Terminal(Terminal),
	/// Expands to its production (pushed in reverse, so the first element is
	/// processed first)
	Sequence(Vec<SymbolId>),
	/// A blocked array/map iteration: its production is re-pushed for every
	/// item, and it matches `end` when the iteration stops
	Repeater {
		end: Terminal,
		production: Vec<SymbolId>,
	},
	/// A JSON union: one labeled branch per variant; `union_end` is pushed
	/// under the chosen branch when the tag-object form is used, so the
	/// closing `}` gets consumed
	Alternative {
		labels: Vec<String>,
		branches: Vec<SymbolId>,
		union_end: SymbolId,
	},

	// Implicit actions, surfaced to the owning decoder
	/// Position the decoder at the named field (JSON), or pin the reader
	/// slot the next value lands in (resolution)
	FieldAdjust {
		name: String,
		position: usize,
		default: Option<serde_json::Value>,
	},
	/// The order in which the reader will observe its fields: reader
	/// positions, in read order
	FieldOrder { order: Vec<usize> },
	/// Reader-side symbol table for JSON enum reads
	EnumLabels { symbols: Vec<String> },
	/// Writer ordinal -> reader ordinal remap; `None` entries fail at read
	/// time unless covered by the reader's `default` symbol (already folded
	/// into the mapping at grammar build time)
	EnumAdjust {
		mapping: Vec<Option<usize>>,
		writer_symbols: Vec<String>,
	},
	/// Read the writer's union index and continue with that branch
	WriterUnion { branches: Vec<SymbolId> },
	/// Surface the reader branch a resolved union value belongs to
	UnionAdjust {
		reader_branch: usize,
		production: SymbolId,
	},
	/// A primitive promotion: the reader asked for `reader`, the wire holds
	/// `writer`
	Resolve { writer: Terminal, reader: Terminal },
	/// Skip one writer-only value, described by its (writer-side) grammar
	Skip { production: SymbolId },
	/// Switch the decoder input to these pre-encoded default bytes
	DefaultStart { bytes: Vec<u8> },
	/// Restore the decoder input after a spliced default
	DefaultEnd,
	/// Consume the closing `}` of a JSON union tag object
	UnionEnd,
	/// Fails when reached: records a resolution mismatch that only matters
	/// if the writer actually uses this part of the schema
	ErrorAction {
		kind: crate::ErrorKind,
		message: String,
	},
}

impl Symbol {
	pub(crate) fn is_implicit_action(&self) -> bool {
		matches!(
			self,
			Symbol::FieldAdjust { .. }
				| Symbol::FieldOrder { .. }
				| Symbol::EnumLabels { .. }
				| Symbol::EnumAdjust { .. }
				| Symbol::WriterUnion { .. }
				| Symbol::UnionAdjust { .. }
				| Symbol::Skip { .. }
				| Symbol::DefaultStart { .. }
				| Symbol::DefaultEnd
				| Symbol::UnionEnd
				| Symbol::ErrorAction { .. }
		)
	}
}

/// Arena of [`Symbol`]s compiled from one schema (or one writer/reader pair)
///
/// Immutable once compiled; shared read-only between decoders.
#[derive(Debug)]
pub(crate) struct Grammar {
	nodes: Vec<Symbol>,
	root: SymbolId,
}

impl Grammar {
	pub(crate) fn root(&self) -> SymbolId {
		self.root
	}
}

impl std::ops::Index<SymbolId> for Grammar {
	type Output = Symbol;
	fn index(&self, id: SymbolId) -> &Symbol {
		&self.nodes[id.idx]
	}
}

/// Builder-side view of a [`Grammar`]: symbols can still be appended and
/// placeholder slots patched (for cyclic schemas)
pub(crate) struct GrammarBuilder {
	nodes: Vec<Symbol>,
}

impl GrammarBuilder {
	pub(crate) fn new() -> Self {
		Self { nodes: Vec::new() }
	}

	pub(crate) fn push(&mut self, symbol: Symbol) -> SymbolId {
		let idx = self.nodes.len();
		self.nodes.push(symbol);
		SymbolId { idx }
	}

	/// Reserve a slot for a symbol that is not built yet, so that cyclic
	/// schemas can reference it before recursing
	pub(crate) fn forward(&mut self) -> SymbolId {
		self.push(Symbol::ErrorAction {
			kind: crate::ErrorKind::UnresolvedSchema,
			message: "Forward symbol was never patched".to_owned(),
		})
	}

	/// Patch a previously [`forward`](Self::forward)ed slot
	pub(crate) fn patch(&mut self, id: SymbolId, symbol: Symbol) {
		self.nodes[id.idx] = symbol;
	}

	pub(crate) fn finish(self, root: SymbolId) -> Grammar {
		Grammar {
			nodes: self.nodes,
			root,
		}
	}
}
