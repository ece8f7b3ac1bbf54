use super::Decoder;

use crate::{
	logical::{ConversionContext, DatumConfig, StringRepr},
	schema::{Schema, SchemaKey, SchemaType},
	Error, ErrorKind, Value,
};

/// Orchestrates a decode: recurses over the *reader* schema, pulls
/// primitives out of a [`Decoder`], and applies logical-type conversions at
/// every node
///
/// Which decoder drives the bytes (plain binary, resolving, JSON) is
/// invisible at this level: the decoder contract guarantees fields arrive
/// in reader declaration order.
pub struct DatumReader<'s, 'c> {
	schema: &'s Schema,
	config: &'c DatumConfig,
}

impl<'s, 'c> DatumReader<'s, 'c> {
	/// Construct a `DatumReader` for the given reader schema and datum-model
	/// config
	pub fn new(schema: &'s Schema, config: &'c DatumConfig) -> Self {
		Self { schema, config }
	}

	/// Read one datum
	pub fn read<D: Decoder>(&self, decoder: &mut D) -> Result<Value, Error> {
		let value = self.read_node(SchemaKey::root(), decoder, self.config.allowed_depth, None)?;
		decoder.drain()?;
		Ok(value)
	}

	/// Read one datum, reusing the allocations of a previously-read value
	///
	/// Arrays, maps and records recycle their containers (and record fields
	/// recurse into the old field values), which cuts allocation when
	/// decoding many datums of the same shape.
	pub fn read_reusing<D: Decoder>(&self, reuse: Value, decoder: &mut D) -> Result<Value, Error> {
		let value =
			self.read_node(SchemaKey::root(), decoder, self.config.allowed_depth, Some(reuse))?;
		decoder.drain()?;
		Ok(value)
	}

	fn read_node<D: Decoder>(
		&self,
		key: SchemaKey,
		decoder: &mut D,
		allowed_depth: usize,
		reuse: Option<Value>,
	) -> Result<Value, Error> {
		let allowed_depth = allowed_depth.checked_sub(1).ok_or_else(|| {
			Error::new(ErrorKind::Capacity, "Datum is deeper than the allowed depth")
		})?;
		let node = &self.schema[key];
		if let Some(logical_type) = &node.logical_type {
			if let Some(conversion) = self.config.conversions.get(logical_type.as_str()) {
				let ctx = ConversionContext {
					schema: self.schema,
					key,
					config: self.config,
				};
				if conversion.has_direct_json_decode() {
					// Only the JSON decoder answers this; `None` has
					// consumed nothing
					if let Some(raw) = decoder.read_raw_json()? {
						return conversion.direct_json_decode(raw, ctx);
					}
				}
				let wire = self.read_regular(key, decoder, allowed_depth, reuse)?;
				return conversion.from_wire(wire, ctx);
			}
		}
		self.read_regular(key, decoder, allowed_depth, reuse)
	}

	fn read_regular<D: Decoder>(
		&self,
		key: SchemaKey,
		decoder: &mut D,
		allowed_depth: usize,
		reuse: Option<Value>,
	) -> Result<Value, Error> {
		Ok(match &self.schema[key].type_ {
			SchemaType::Null => {
				decoder.read_null()?;
				Value::Null
			}
			SchemaType::Boolean => Value::Boolean(decoder.read_boolean()?),
			SchemaType::Int => Value::Int(decoder.read_int()?),
			SchemaType::Long => Value::Long(decoder.read_long()?),
			SchemaType::Float => Value::Float(decoder.read_float()?),
			SchemaType::Double => Value::Double(decoder.read_double()?),
			SchemaType::Bytes => Value::Bytes(decoder.read_bytes()?),
			SchemaType::String => match self.config.string_repr {
				StringRepr::Native => Value::String(decoder.read_string()?),
				StringRepr::Utf8Bytes => Value::Bytes(decoder.read_string_bytes()?),
			},
			SchemaType::Fixed(fixed) => Value::Fixed(decoder.read_fixed(fixed.size)?),
			SchemaType::Enum(enum_) => {
				let ordinal = decoder.read_enum()?;
				let symbol = enum_.symbols.get(ordinal).ok_or_else(|| {
					Error::custom(
						ErrorKind::Malformed,
						format_args!(
							"Enum ordinal {ordinal} is out of bounds for {} symbols",
							enum_.symbols.len()
						),
					)
				})?;
				Value::Enum(ordinal, symbol.clone())
			}
			SchemaType::Array(array) => {
				let mut items = match reuse {
					Some(Value::Array(mut items)) => {
						items.clear();
						items
					}
					_ => Vec::new(),
				};
				decoder.read_array_start()?;
				while decoder.read_array_next()? {
					items.push(self.read_node(array.items, decoder, allowed_depth, None)?);
				}
				Value::Array(items)
			}
			SchemaType::Map(map) => {
				let mut entries = match reuse {
					Some(Value::Map(mut entries)) => {
						entries.clear();
						entries
					}
					_ => Default::default(),
				};
				decoder.read_map_start()?;
				while decoder.read_map_next()? {
					let map_key = decoder.read_map_key()?;
					let value = self.read_node(map.values, decoder, allowed_depth, None)?;
					entries.insert(map_key, value);
				}
				Value::Map(entries)
			}
			SchemaType::Union(union) => {
				let index = decoder.read_union_index()?;
				let &variant = union.variants.get(index).ok_or_else(|| {
					Error::custom(
						ErrorKind::Malformed,
						format_args!(
							"Union branch {index} is out of bounds for {} branches",
							union.variants.len()
						),
					)
				})?;
				let seed = match reuse {
					Some(Value::Union(old_index, old_value)) if old_index == index => {
						Some(*old_value)
					}
					_ => None,
				};
				Value::Union(
					index,
					Box::new(self.read_node(variant, decoder, allowed_depth, seed)?),
				)
			}
			SchemaType::Record(record) => {
				decoder.read_record_start()?;
				let order = decoder.read_field_order(record)?;
				let mut seeds: Vec<Option<Value>> = match reuse {
					Some(Value::Record(old)) if old.len() == record.fields.len() => {
						old.into_iter().map(|(_, value)| Some(value)).collect()
					}
					_ => vec![None; record.fields.len()],
				};
				let mut slots: Vec<Option<Value>> = vec![None; record.fields.len()];
				for &position in &order {
					let field = record.fields.get(position).ok_or_else(|| {
						Error::custom(
							ErrorKind::Malformed,
							format_args!("Field position {position} is out of bounds"),
						)
					})?;
					decoder.read_field_start(field)?;
					let seed = seeds.get_mut(position).and_then(Option::take);
					let value = self.read_node(field.type_, decoder, allowed_depth, seed)?;
					decoder.read_field_end()?;
					slots[position] = Some(value);
				}
				decoder.read_record_end()?;
				Value::Record(
					record
						.fields
						.iter()
						.zip(slots)
						.map(|(field, slot)| {
							Ok((
								field.name.clone(),
								slot.ok_or_else(|| {
									Error::custom(
										ErrorKind::MissingField,
										format_args!("Field {:?} was never surfaced", field.name),
									)
								})?,
							))
						})
						.collect::<Result<_, Error>>()?,
				)
			}
		})
	}
}
