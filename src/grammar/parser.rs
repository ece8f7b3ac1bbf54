use super::{Grammar, Symbol, SymbolId, Terminal};

use crate::{Error, ErrorKind};

/// Stack-driven symbol advancer
///
/// Owned by exactly one decoder for the lifetime of one datum read. The
/// parser never touches the input itself: it matches [`Terminal`]s the
/// decoder asks for against the compiled grammar, and hands implicit
/// actions back to the decoder to perform.
pub(crate) struct Parser<'g> {
	grammar: &'g Grammar,
	stack: Vec<SymbolId>,
}

/// What [`Parser::advance`] stopped on
pub(crate) enum Advanced {
	/// The expected terminal matched. For promotions this is the
	/// *writer-side* terminal, telling the decoder what is actually on the
	/// wire.
	Terminal(Terminal),
	/// An implicit action the decoder must perform, then call `advance`
	/// again
	Action(SymbolId),
}

/// What [`Parser::pop_next`] stopped on
pub(crate) enum Popped {
	Terminal(Terminal),
	Action(SymbolId),
	Alternative(SymbolId),
}

impl<'g> Parser<'g> {
	pub(crate) fn new(grammar: &'g Grammar) -> Self {
		Self {
			grammar,
			stack: vec![grammar.root()],
		}
	}

	pub(crate) fn grammar(&self) -> &'g Grammar {
		self.grammar
	}

	/// Push a production chosen outside the regular expansion (union
	/// branches, spliced defaults)
	pub(crate) fn push(&mut self, id: SymbolId) {
		self.stack.push(id);
	}

	fn pop(&mut self, expected: Terminal) -> Result<SymbolId, Error> {
		self.stack.pop().ok_or_else(|| {
			Error::custom(
				ErrorKind::TypeMismatch,
				format_args!(
					"Attempting to read {} but the value is already fully decoded",
					expected.name()
				),
			)
		})
	}

	/// Advance the grammar up to the `expected` terminal
	///
	/// - a matching terminal is consumed and returned (for promotions, the
	///   writer-side terminal is returned instead so the decoder knows what
	///   to read from the wire);
	/// - a non-matching terminal fails with `TypeMismatch`;
	/// - non-terminals are expanded in place;
	/// - a repeater matching `expected` against its `end` consumes the
	///   repeater and ends the iteration;
	/// - implicit actions are surfaced to the caller, which must perform
	///   them and call `advance` again.
	pub(crate) fn advance(&mut self, expected: Terminal) -> Result<Advanced, Error> {
		let grammar = self.grammar;
		loop {
			let top = self.pop(expected)?;
			match &grammar[top] {
				Symbol::Terminal(t) if *t == expected => return Ok(Advanced::Terminal(*t)),
				Symbol::Terminal(t) => {
					return Err(Error::custom(
						ErrorKind::TypeMismatch,
						format_args!("Expected {}, found {}", t.name(), expected.name()),
					));
				}
				Symbol::Resolve { writer, reader } if *reader == expected => {
					return Ok(Advanced::Terminal(*writer));
				}
				Symbol::Resolve { reader, .. } => {
					return Err(Error::custom(
						ErrorKind::TypeMismatch,
						format_args!("Expected {}, found {}", reader.name(), expected.name()),
					));
				}
				Symbol::Sequence(production) => {
					self.stack.extend(production.iter().rev());
				}
				Symbol::Repeater { end, .. } if *end == expected => {
					return Ok(Advanced::Terminal(*end));
				}
				Symbol::Repeater { production, .. } => {
					// The repeater stays under its production so the next
					// item expands it again
					self.stack.push(top);
					self.stack.extend(production.iter().rev());
				}
				Symbol::Alternative { .. } => {
					return Err(Error::custom(
						ErrorKind::TypeMismatch,
						format_args!("Expected {} but the schema holds a union here", expected.name()),
					));
				}
				Symbol::ErrorAction { kind, message } => {
					return Err(Error::custom(*kind, message));
				}
				_ => return Ok(Advanced::Action(top)),
			}
		}
	}

	/// Pop the next unit without an expectation: used by union reads, where
	/// the decoder inspects the alternative/adjust symbol itself
	pub(crate) fn pop_next(&mut self) -> Result<Popped, Error> {
		let grammar = self.grammar;
		loop {
			let top = self.stack.pop().ok_or_else(|| {
				Error::new(
					ErrorKind::TypeMismatch,
					"Attempting to read a value that is already fully decoded",
				)
			})?;
			match &grammar[top] {
				Symbol::Terminal(t) => return Ok(Popped::Terminal(*t)),
				Symbol::Sequence(production) => {
					self.stack.extend(production.iter().rev());
				}
				Symbol::Alternative { .. } => return Ok(Popped::Alternative(top)),
				Symbol::Repeater { production, .. } => {
					// This is the start of an item: the caller established
					// there is one (via array/map-next), so expand one round
					self.stack.push(top);
					self.stack.extend(production.iter().rev());
				}
				Symbol::ErrorAction { kind, message } => {
					return Err(Error::custom(*kind, message));
				}
				_ => return Ok(Popped::Action(top)),
			}
		}
	}

	/// Pop the single symbol describing the next value, without expanding it
	///
	/// Used by the JSON decoder when a direct-decode hook captures the value
	/// as a raw tree: the grammar must move past the value in one step.
	/// Implicit actions on top are surfaced first, exactly like `advance`.
	pub(crate) fn pop_value_symbol(&mut self) -> Result<Advanced, Error> {
		let grammar = self.grammar;
		loop {
			let top = self.stack.pop().ok_or_else(|| {
				Error::new(
					ErrorKind::TypeMismatch,
					"Attempting to read a value that is already fully decoded",
				)
			})?;
			match &grammar[top] {
				Symbol::Terminal(t) => return Ok(Advanced::Terminal(*t)),
				Symbol::Repeater { production, .. } => {
					// The value is one *item* of the repeater, not the whole
					// iteration: expand one round and pop the item symbol
					self.stack.push(top);
					self.stack.extend(production.iter().rev());
				}
				Symbol::Sequence(_) | Symbol::Alternative { .. } => {
					// Consumed whole: the decoder captured the corresponding
					// input as a raw tree
					return Ok(Advanced::Terminal(Terminal::Null));
				}
				Symbol::ErrorAction { kind, message } => {
					return Err(Error::custom(*kind, message));
				}
				_ => return Ok(Advanced::Action(top)),
			}
		}
	}

	/// Pop one trailing implicit action, if any is pending
	///
	/// Used to drain skip/restore/close actions that sit after the last
	/// terminal of a datum (or of a nested scope).
	pub(crate) fn pop_trailing_action(&mut self) -> Result<Option<SymbolId>, Error> {
		let grammar = self.grammar;
		loop {
			let Some(&top) = self.stack.last() else {
				return Ok(None);
			};
			match &grammar[top] {
				Symbol::Sequence(production) => {
					self.stack.pop();
					self.stack.extend(production.iter().rev());
				}
				Symbol::ErrorAction { kind, message } => {
					return Err(Error::custom(*kind, message));
				}
				s if s.is_implicit_action() => {
					self.stack.pop();
					return Ok(Some(top));
				}
				_ => return Ok(None),
			}
		}
	}

}
