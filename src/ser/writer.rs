use super::Encoder;

use crate::{
	logical::{ConversionContext, DatumConfig},
	schema::{LogicalType, Schema, SchemaKey, SchemaType, Union},
	Error, ErrorKind, Value,
};

/// Orchestrates an encode: recurses over the schema, pushes primitives into
/// an [`Encoder`], and applies logical-type conversions at every node
///
/// Fields are always emitted in declaration order. Union-branch mismatches
/// fail before any byte is emitted for the value.
pub struct DatumWriter<'s, 'c> {
	schema: &'s Schema,
	config: &'c DatumConfig,
}

impl<'s, 'c> DatumWriter<'s, 'c> {
	/// Construct a `DatumWriter` for the given schema and datum-model config
	pub fn new(schema: &'s Schema, config: &'c DatumConfig) -> Self {
		Self { schema, config }
	}

	/// Write one datum
	pub fn write<E: Encoder>(&self, value: &Value, encoder: &mut E) -> Result<(), Error> {
		self.write_node(SchemaKey::root(), value, encoder, self.config.allowed_depth)
	}

	fn write_node<E: Encoder>(
		&self,
		key: SchemaKey,
		value: &Value,
		encoder: &mut E,
		allowed_depth: usize,
	) -> Result<(), Error> {
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
				if encoder.supports_raw_json() {
					if let Some(raw) = conversion.direct_json_encode(value, ctx)? {
						if encoder.write_raw_json(&raw)? {
							return Ok(());
						}
					}
				}
				let wire = conversion.to_wire(value, ctx)?;
				return self.write_regular(key, &wire, encoder, allowed_depth);
			}
		}
		self.write_regular(key, value, encoder, allowed_depth)
	}

	fn write_regular<E: Encoder>(
		&self,
		key: SchemaKey,
		value: &Value,
		encoder: &mut E,
		allowed_depth: usize,
	) -> Result<(), Error> {
		let node = &self.schema[key];
		let type_mismatch = || {
			Error::custom(
				ErrorKind::TypeMismatch,
				format_args!(
					"Cannot write a {} value where the schema expects {}",
					value.type_name(),
					node.type_.type_label()
				),
			)
		};
		match (&node.type_, value) {
			(SchemaType::Null, Value::Null) => encoder.write_null(),
			(SchemaType::Boolean, Value::Boolean(v)) => encoder.write_boolean(*v),
			(SchemaType::Int, Value::Int(v)) => encoder.write_int(*v),
			(SchemaType::Long, Value::Long(v)) => encoder.write_long(*v),
			(SchemaType::Long, Value::Int(v)) => encoder.write_long(i64::from(*v)),
			(SchemaType::Float, Value::Float(v)) => encoder.write_float(*v),
			(SchemaType::Float, Value::Int(v)) => encoder.write_float(*v as f32),
			(SchemaType::Float, Value::Long(v)) => encoder.write_float(*v as f32),
			(SchemaType::Double, Value::Double(v)) => encoder.write_double(*v),
			(SchemaType::Double, Value::Float(v)) => encoder.write_double(f64::from(*v)),
			(SchemaType::Double, Value::Int(v)) => encoder.write_double(f64::from(*v)),
			(SchemaType::Double, Value::Long(v)) => encoder.write_double(*v as f64),
			(SchemaType::Bytes, Value::Bytes(v)) => encoder.write_bytes(v),
			(SchemaType::Bytes, Value::String(v)) => encoder.write_bytes(v.as_bytes()),
			(SchemaType::String, Value::String(v)) => encoder.write_string(v),
			(SchemaType::String, Value::Bytes(v)) => {
				encoder.write_string(std::str::from_utf8(v).map_err(|_| type_mismatch())?)
			}
			(SchemaType::Fixed(fixed), Value::Fixed(v) | Value::Bytes(v)) => {
				if v.len() != fixed.size {
					return Err(Error::custom(
						ErrorKind::TypeMismatch,
						format_args!(
							"Fixed value has {} bytes, schema declares {}",
							v.len(),
							fixed.size
						),
					));
				}
				encoder.write_fixed(v)
			}
			(SchemaType::Enum(enum_), Value::Enum(ordinal, symbol)) => {
				let ordinal = if enum_.symbols.get(*ordinal).map(String::as_str)
					== Some(symbol.as_str())
				{
					*ordinal
				} else {
					enum_.ordinal_of(symbol).ok_or_else(type_mismatch)?
				};
				encoder.write_enum(ordinal, symbol)
			}
			(SchemaType::Enum(enum_), Value::String(symbol)) => {
				let ordinal = enum_.ordinal_of(symbol).ok_or_else(type_mismatch)?;
				encoder.write_enum(ordinal, symbol)
			}
			(SchemaType::Array(array), Value::Array(items)) => {
				encoder.write_array_start(items.len())?;
				for item in items {
					self.write_node(array.items, item, encoder, allowed_depth)?;
				}
				encoder.write_array_end()
			}
			(SchemaType::Map(map), Value::Map(entries)) => {
				encoder.write_map_start(entries.len())?;
				for (map_key, entry) in entries {
					encoder.write_map_key(map_key)?;
					self.write_node(map.values, entry, encoder, allowed_depth)?;
				}
				encoder.write_map_end()
			}
			(SchemaType::Union(union), value) => self.write_union(union, value, encoder, allowed_depth),
			(SchemaType::Record(record), Value::Record(value_fields)) => {
				encoder.write_record_start()?;
				for field in &record.fields {
					// Values usually arrive in declaration order; fall back
					// to a name search when they don't
					let value = value_fields
						.get(field.position)
						.filter(|(name, _)| *name == field.name)
						.or_else(|| value_fields.iter().find(|(name, _)| *name == field.name))
						.map(|(_, value)| value)
						.ok_or_else(|| {
							Error::custom(
								ErrorKind::MissingField,
								format_args!("Value lacks record field {:?}", field.name),
							)
						})?;
					encoder.write_field_start(&field.name)?;
					self.write_node(field.type_, value, encoder, allowed_depth)?;
				}
				encoder.write_record_end()
			}
			_ => Err(type_mismatch()),
		}
	}

	/// Pick the union branch for `value`, failing with `UnionBranch` before
	/// anything is emitted when no branch fits
	fn write_union<E: Encoder>(
		&self,
		union: &Union,
		value: &Value,
		encoder: &mut E,
		allowed_depth: usize,
	) -> Result<(), Error> {
		let (index, inner) = match value {
			Value::Union(index, inner) => {
				let &variant = union.variants.get(*index).ok_or_else(|| {
					Error::custom(
						ErrorKind::UnionBranch,
						format_args!(
							"Union branch {index} is out of bounds for {} branches",
							union.variants.len()
						),
					)
				})?;
				if !self.branch_matches(variant, inner) {
					return Err(Error::custom(
						ErrorKind::UnionBranch,
						format_args!(
							"A {} value does not fit union branch {}",
							inner.type_name(),
							self.schema[variant].type_.type_label()
						),
					));
				}
				(*index, &**inner)
			}
			untagged => {
				let index = union
					.variants
					.iter()
					.position(|&variant| self.branch_matches(variant, untagged))
					.ok_or_else(|| {
						Error::custom(
							ErrorKind::UnionBranch,
							format_args!(
								"A {} value matches no branch of the union",
								untagged.type_name()
							),
						)
					})?;
				(index, untagged)
			}
		};
		let variant = union.variants[index];
		let label = self.schema[variant].type_.type_label();
		let non_null_branches = union
			.variants
			.iter()
			.filter(|&&v| !matches!(self.schema[v].type_, SchemaType::Null))
			.count();
		encoder.write_union_start(index, label, non_null_branches == 1)?;
		self.write_node(variant, inner, encoder, allowed_depth)?;
		encoder.write_union_end()
	}

	/// Shallow compatibility of a value with a union branch
	fn branch_matches(&self, key: SchemaKey, value: &Value) -> bool {
		let node = &self.schema[key];
		if let Some(logical_type) = &node.logical_type {
			let typed_match = matches!(
				(logical_type, value),
				(LogicalType::Date, Value::Date(_))
					| (
						LogicalType::TimestampMillis,
						Value::TimestampMillis(_) | Value::Instant(_)
					) | (
						LogicalType::TimestampMicros,
						Value::TimestampMicros(_) | Value::Instant(_)
					) | (LogicalType::Decimal(_), Value::Decimal(_))
					| (LogicalType::BigInteger, Value::BigInteger(_))
					| (LogicalType::Uuid, Value::Uuid(_))
					| (LogicalType::Instant, Value::Instant(_))
					| (LogicalType::AnyTemporal, Value::Temporal(_))
					| (LogicalType::Any, Value::Any(_))
			);
			if typed_match {
				return true;
			}
		}
		match (&node.type_, value) {
			(SchemaType::Null, Value::Null) => true,
			(SchemaType::Boolean, Value::Boolean(_)) => true,
			(SchemaType::Int, Value::Int(_)) => true,
			(SchemaType::Long, Value::Long(_) | Value::Int(_)) => true,
			(SchemaType::Float, Value::Float(_)) => true,
			(SchemaType::Double, Value::Double(_) | Value::Float(_)) => true,
			(SchemaType::Bytes, Value::Bytes(_)) => true,
			(SchemaType::String, Value::String(_)) => true,
			(SchemaType::Fixed(fixed), Value::Fixed(bytes)) => bytes.len() == fixed.size,
			(SchemaType::Enum(enum_), Value::Enum(_, symbol)) => enum_.ordinal_of(symbol).is_some(),
			(SchemaType::Array(_), Value::Array(_)) => true,
			(SchemaType::Map(_), Value::Map(_)) => true,
			(SchemaType::Record(_), Value::Record(_)) => true,
			_ => false,
		}
	}
}
