use super::{schema_error, Name};

use crate::Error;

/// Open property bag carried by every schema node
///
/// Keys that the parser does not consume structurally (e.g. `format` on an
/// `instant` logical type) land here, preserving their JSON values.
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// An editable representation of an Avro schema
///
/// In there, references to other nodes are represented as [`SchemaKey`], which
/// allow to index into [`SchemaMut`].
///
/// It is useful to implement it this way because, due to how referencing via
/// [Names](https://avro.apache.org/docs/current/specification/#names) works in Avro,
/// the most performant representation of an Avro schema is not a tree but a
/// possibly-cyclic general directed graph.
#[derive(Clone, Debug)]
pub struct SchemaMut {
	// First node in the array is considered to be the root
	pub(super) nodes: Vec<SchemaNode>,
	pub(super) schema_json: Option<String>,
}

impl SchemaMut {
	/// Obtain the underlying graph storage
	///
	/// The first node (index `0`) is the root of the schema.
	///
	/// [`SchemaKey`]s can be converted to indexes of this `Vec`.
	pub fn nodes(&self) -> &[SchemaNode] {
		&self.nodes
	}

	/// Obtain the underlying graph storage mutably
	///
	/// This loses the original JSON. If obtaining it again (via
	/// [`Schema::json`](crate::Schema::json)) it will be re-generated from
	/// the graph.
	///
	/// The first node (index `0`) is the root of the schema.
	pub fn nodes_mut(&mut self) -> &mut Vec<SchemaNode> {
		self.schema_json = None;
		&mut self.nodes
	}

	/// Obtain the root of the Schema
	///
	/// It is the first node of the `nodes` `Vec`.
	///
	/// # Panics
	/// If the `nodes` `Vec` is empty.
	/// This can only happen if you have updated it through
	/// [`nodes_mut`](Self::nodes_mut), as parsing otherwise guarantees that
	/// this cannot happen.
	pub fn root(&self) -> &SchemaNode {
		self.nodes.first().expect(
			"Schema should have nodes - have you updated it \
				in such a way that all of its nodes were removed?",
		)
	}

	/// Initialize a [`SchemaMut`] from a set of nodes.
	///
	/// The first node (index `0`) is the root of the schema.
	pub fn from_nodes(nodes: Vec<SchemaNode>) -> Self {
		Self {
			nodes,
			schema_json: None,
		}
	}

	/// Try to get the node at the given [`SchemaKey`]
	///
	/// (or return `None` if the key is invalid)
	///
	/// If you want to panic on invalid keys, use `schema[key]` instead.
	pub fn get(&self, key: SchemaKey) -> Option<&SchemaNode> {
		self.nodes.get(key.idx)
	}

	/// Turn this [`SchemaMut`] into a [`Schema`]
	///
	/// [`Schema`] is what decoders and encoders consume.
	///
	/// This will fail if the schema graph is invalid (out-of-bounds
	/// [`SchemaKey`]s, malformed unions, defaults incompatible with their
	/// field type, unconditional cycles...).
	pub fn freeze(self) -> Result<Schema, Error> {
		self.validate()?;
		self.check_for_cycles()
			.map_err(|e| schema_error(format_args!("{e}")))?;
		let fingerprint = self.canonical_form_rabin_fingerprint()?;
		let schema_json = match &self.schema_json {
			Some(json) => json.clone(),
			None => self.serialize_to_json()?,
		};
		Ok(Schema {
			nodes: self.nodes,
			fingerprint,
			schema_json,
		})
	}

	fn validate(&self) -> Result<(), Error> {
		if self.nodes.is_empty() {
			return Err(schema_error("Schema must have at least one node (the root)"));
		}
		let check_key = |key: SchemaKey| -> Result<(), Error> {
			if key.idx >= self.nodes.len() {
				return Err(schema_error(format_args!(
					"SchemaKey index {} is out of bounds (len: {})",
					key.idx,
					self.nodes.len()
				)));
			}
			Ok(())
		};
		for node in &self.nodes {
			match &node.type_ {
				SchemaType::Array(array) => check_key(array.items)?,
				SchemaType::Map(map) => check_key(map.values)?,
				SchemaType::Union(union) => {
					let mut seen_unnamed = Vec::new();
					for &variant in &union.variants {
						check_key(variant)?;
						let variant_node = &self.nodes[variant.idx];
						match &variant_node.type_ {
							SchemaType::Union(_) => {
								return Err(schema_error("Unions may not immediately contain other unions"));
							}
							SchemaType::Record(_) | SchemaType::Enum(_) | SchemaType::Fixed(_) => {}
							other => {
								let kind = std::mem::discriminant(other);
								if seen_unnamed.contains(&kind) {
									return Err(schema_error(format_args!(
										"Union contains duplicate non-named type {:?}",
										other.type_label()
									)));
								}
								seen_unnamed.push(kind);
							}
						}
					}
				}
				SchemaType::Record(record) => {
					for field in &record.fields {
						check_key(field.type_)?;
						if let Some(default) = &field.default {
							self.validate_default(field, default)?;
						}
					}
				}
				SchemaType::Enum(enum_) => {
					if let Some(default) = &enum_.default {
						if !enum_.symbols.iter().any(|s| s == default) {
							return Err(schema_error(format_args!(
								"Enum {:?} declares default symbol {default:?} \
									which is not among its symbols",
								enum_.name
							)));
						}
					}
				}
				SchemaType::Null
				| SchemaType::Boolean
				| SchemaType::Int
				| SchemaType::Long
				| SchemaType::Float
				| SchemaType::Double
				| SchemaType::Bytes
				| SchemaType::String
				| SchemaType::Fixed(_) => {}
			}
		}
		Ok(())
	}

	/// A field default must be JSON-compatible with the field schema (its
	/// first branch, if the field is a union).
	fn validate_default(
		&self,
		field: &RecordField,
		default: &serde_json::Value,
	) -> Result<(), Error> {
		let mut key = field.type_;
		if let SchemaType::Union(union) = &self.nodes[key.idx].type_ {
			key = *union.variants.first().ok_or_else(|| {
				schema_error(format_args!("Empty union on field {:?}", field.name))
			})?;
		}
		let node = self.nodes.get(key.idx).ok_or_else(|| {
			schema_error(format_args!(
				"SchemaKey index {} is out of bounds (len: {})",
				key.idx,
				self.nodes.len()
			))
		})?;
		use serde_json::Value as Json;
		let compatible = match (&node.type_, default) {
			(SchemaType::Null, Json::Null) => true,
			(SchemaType::Boolean, Json::Bool(_)) => true,
			(
				SchemaType::Int | SchemaType::Long | SchemaType::Float | SchemaType::Double,
				Json::Number(_),
			) => true,
			(SchemaType::Bytes | SchemaType::String | SchemaType::Fixed(_), Json::String(_)) => true,
			// The extended JSON codec accepts numbers for bytes (decimal and
			// big-integer logical types), so defaults may use them too
			(SchemaType::Bytes, Json::Number(_)) => true,
			(SchemaType::Enum(_), Json::String(_)) => true,
			(SchemaType::Array(_), Json::Array(_)) => true,
			(SchemaType::Map(_) | SchemaType::Record(_), Json::Object(_)) => true,
			_ => false,
		};
		if !compatible {
			return Err(schema_error(format_args!(
				"Default value for field {:?} is not JSON-compatible with its schema",
				field.name
			)));
		}
		Ok(())
	}
}

/// Main schema type, immutable, consumed by decoders and encoders
///
/// It is obtained by [`freeze`](SchemaMut::freeze)-ing a [`SchemaMut`]
/// (or parsing directly via [`FromStr`](std::str::FromStr)), which
/// guarantees that all [`SchemaKey`]s are in bounds and that the graph
/// contains no unconditional cycle.
#[derive(Clone, Debug)]
pub struct Schema {
	// First node in the array is considered to be the root
	pub(crate) nodes: Vec<SchemaNode>,
	pub(crate) fingerprint: [u8; 8],
	pub(crate) schema_json: String,
}

impl Schema {
	/// The root node of the schema (always the first node)
	pub fn root(&self) -> &SchemaNode {
		&self.nodes[0]
	}

	/// The underlying graph storage (first node is the root)
	pub fn nodes(&self) -> &[SchemaNode] {
		&self.nodes
	}

	/// Obtain the JSON for this schema
	pub fn json(&self) -> &str {
		&self.schema_json
	}

	/// Obtain the Rabin fingerprint of the schema's parsing canonical form
	///
	/// This is the cache key for resolution grammars.
	pub fn rabin_fingerprint(&self) -> &[u8; 8] {
		&self.fingerprint
	}

	/// The fingerprint as a `u64` (little-endian interpretation)
	pub fn fingerprint_u64(&self) -> u64 {
		u64::from_le_bytes(self.fingerprint)
	}
}

impl std::ops::Index<SchemaKey> for Schema {
	type Output = SchemaNode;
	fn index(&self, key: SchemaKey) -> &Self::Output {
		&self.nodes[key.idx]
	}
}

/// The location of a node in a [`SchemaMut`] (or a [`Schema`])
///
/// This can be used to [`Index`](std::ops::Index) into them.
///
/// (Note that `Index`ing with an invalid index would cause a panic.)
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaKey {
	pub(crate) idx: usize,
}

impl SchemaKey {
	/// Construct a new SchemaKey
	///
	/// This is expected to be an index in the [`nodes`](SchemaMut::nodes)
	/// `Vec` of a [`SchemaMut`].
	pub const fn from_idx(idx: usize) -> Self {
		Self { idx }
	}
	/// Obtain the index in the [`nodes`](SchemaMut::nodes) `Vec` that this
	/// [`SchemaKey`] points to.
	pub const fn idx(self) -> usize {
		self.idx
	}
	/// The root of the schema (always index 0)
	pub const fn root() -> Self {
		Self { idx: 0 }
	}
}
impl std::ops::Index<SchemaKey> for SchemaMut {
	type Output = SchemaNode;
	fn index(&self, key: SchemaKey) -> &Self::Output {
		&self.nodes[key.idx]
	}
}
impl std::fmt::Debug for SchemaKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		std::fmt::Debug::fmt(&self.idx, f)
	}
}

/// A node of an avro schema, stored in a [`SchemaMut`] or [`Schema`].
///
/// In there, references to other nodes are represented as [`SchemaKey`].
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct SchemaNode {
	/// The underlying regular type of this node
	pub type_: SchemaType,
	/// Logical type that the avro type is annotated with, if any
	pub logical_type: Option<LogicalType>,
	/// Open key -> JSON property bag (doc, format, custom annotations...)
	pub properties: Properties,
}

impl SchemaNode {
	/// Build a new [`SchemaNode`] from the given regular type, with no
	/// logical type and no properties.
	///
	/// This is equivalent to `type_.into()`.
	pub fn new(type_: SchemaType) -> Self {
		type_.into()
	}

	/// Build a new [`SchemaNode`] from the given regular type and logical
	/// type.
	pub fn with_logical_type(type_: SchemaType, logical_type: LogicalType) -> Self {
		Self {
			type_,
			logical_type: Some(logical_type),
			properties: Properties::new(),
		}
	}
}

/// A primitive or complex type of an avro schema, stored in a [`SchemaNode`].
#[derive(Clone, Debug)]
pub enum SchemaType {
	/// A `null` Avro schema.
	Null,
	/// A `boolean` Avro schema.
	Boolean,
	/// An `int` Avro schema.
	Int,
	/// A `long` Avro schema.
	Long,
	/// A `float` Avro schema.
	Float,
	/// A `double` Avro schema.
	Double,
	/// A `bytes` Avro schema.
	Bytes,
	/// A `string` Avro schema.
	String,
	/// An `array` Avro schema. This variant holds the node of the array
	/// element type.
	Array(Array),
	/// A `map` Avro schema. Keys are assumed to be `string`.
	Map(Map),
	/// A `union` Avro schema.
	Union(Union),
	/// A `record` Avro schema.
	Record(Record),
	/// An `enum` Avro schema.
	Enum(Enum),
	/// A `fixed` Avro schema.
	Fixed(Fixed),
}

impl SchemaType {
	/// If the type is a named type, returns the name of the type.
	pub fn name(&self) -> Option<&Name> {
		match self {
			SchemaType::Record(record) => Some(&record.name),
			SchemaType::Enum(enum_) => Some(&enum_.name),
			SchemaType::Fixed(fixed) => Some(&fixed.name),
			_ => None,
		}
	}

	/// If the type is a named type, returns its reader-side aliases.
	pub fn aliases(&self) -> &[Name] {
		match self {
			SchemaType::Record(record) => &record.aliases,
			SchemaType::Enum(enum_) => &enum_.aliases,
			SchemaType::Fixed(fixed) => &fixed.aliases,
			_ => &[],
		}
	}

	/// The label of this type in union-tagging and error messages: the fully
	/// qualified name for named types, the primitive type name otherwise.
	pub fn type_label(&self) -> &str {
		match self {
			SchemaType::Null => "null",
			SchemaType::Boolean => "boolean",
			SchemaType::Int => "int",
			SchemaType::Long => "long",
			SchemaType::Float => "float",
			SchemaType::Double => "double",
			SchemaType::Bytes => "bytes",
			SchemaType::String => "string",
			SchemaType::Array(_) => "array",
			SchemaType::Map(_) => "map",
			SchemaType::Union(_) => "union",
			SchemaType::Record(record) => record.name.fully_qualified_name(),
			SchemaType::Enum(enum_) => enum_.name.fully_qualified_name(),
			SchemaType::Fixed(fixed) => fixed.name.fully_qualified_name(),
		}
	}
}

/// Component of a [`SchemaMut`]
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct Array {
	/// The key of the schema of each item that will be in the array
	pub items: SchemaKey,
}
impl Array {
	/// `items` is the key of the schema of each item that will be in the
	/// array
	pub fn new(items: SchemaKey) -> Self {
		Self { items }
	}
}

/// Component of a [`SchemaMut`]
///
/// An Avro map is a collection of key-value pairs, where the keys are assumed
/// to be strings.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct Map {
	/// The key of the schema of each value that will be in the map
	pub values: SchemaKey,
}
impl Map {
	/// `values` is the key of the schema of each value that will be in the
	/// map
	pub fn new(values: SchemaKey) -> Self {
		Self { values }
	}
}

/// Component of a [`SchemaMut`]
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct Union {
	/// The keys of the schemas of each variant that this Avro *union*
	/// supports.
	pub variants: Vec<SchemaKey>,
}
impl Union {
	/// `variants` is the keys of the schemas of each variant that this Avro
	/// *union* supports.
	pub fn new(variants: Vec<SchemaKey>) -> Self {
		Self { variants }
	}
}

/// Component of a [`SchemaMut`]
///
/// An avro `record` is ~equivalent to a Rust struct.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct Record {
	/// The list of fields in this *record*, in declaration order
	pub fields: Vec<RecordField>,
	/// The name of the record (including namespace)
	pub name: Name,
	/// Reader-side aliases for this record's name
	pub aliases: Vec<Name>,
	/// Whether this record was declared with `"type": "error"`
	pub is_error: bool,
}
impl Record {
	/// `name` is the name of the record (including namespace), and `fields`
	/// is the list of fields in this record.
	pub fn new(name: Name, fields: Vec<RecordField>) -> Self {
		Self {
			fields,
			name,
			aliases: Vec::new(),
			is_error: false,
		}
	}
}

/// Which sort order a record field declares
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FieldOrder {
	/// Sorted lexicographically ascending (the default)
	#[default]
	Ascending,
	/// Sorted lexicographically descending
	Descending,
	/// Ignored when comparing records
	Ignore,
}

impl FieldOrder {
	pub(crate) fn as_str(self) -> &'static str {
		match self {
			FieldOrder::Ascending => "ascending",
			FieldOrder::Descending => "descending",
			FieldOrder::Ignore => "ignore",
		}
	}
}

/// Component of a [`SchemaMut`]
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct RecordField {
	/// Name of the field
	pub name: String,
	/// The key of the schema of the type of this field
	pub type_: SchemaKey,
	/// Default value for this field, as declared in the schema JSON
	pub default: Option<serde_json::Value>,
	/// Declared sort order
	pub order: FieldOrder,
	/// Reader-side aliases for this field's name
	pub aliases: Vec<String>,
	/// 0-indexed declaration slot - everywhere reorder logic operates, this
	/// is the position it refers to
	pub position: usize,
	/// Open property bag for this field
	pub properties: Properties,
}
impl RecordField {
	/// `schema` is the key of the schema of the type of this field.
	pub fn new(name: impl Into<String>, schema: SchemaKey, position: usize) -> Self {
		Self {
			name: name.into(),
			type_: schema,
			default: None,
			order: FieldOrder::default(),
			aliases: Vec::new(),
			position,
			properties: Properties::new(),
		}
	}
}

/// Component of a [`SchemaMut`]
///
/// This is the ~equivalent of a Rust `enum` where none of the variants would
/// hold any inner value. (e.g. `enum Foo { Bar, Baz }`)
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct Enum {
	/// All the variants of the enum (e.g. `["Bar", "Baz"]`)
	pub symbols: Vec<String>,
	/// The name of the enum (including namespace)
	pub name: Name,
	/// Reader-side aliases for this enum's name
	pub aliases: Vec<Name>,
	/// Symbol to fall back to when a writer symbol is unknown to the reader
	pub default: Option<String>,
}
impl Enum {
	/// `name` is the name of the enum (including namespace), and `symbols`
	/// is the list of variants of the enum.
	pub fn new(name: Name, symbols: Vec<String>) -> Self {
		Self {
			symbols,
			name,
			aliases: Vec::new(),
			default: None,
		}
	}

	/// Position of `symbol` in the symbol table, if present
	pub fn ordinal_of(&self, symbol: &str) -> Option<usize> {
		self.symbols.iter().position(|s| s == symbol)
	}
}

/// Component of a [`SchemaMut`]
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct Fixed {
	/// The size in bytes of the *fixed* type
	pub size: usize,
	/// The name of the *fixed* type, including the namespace
	pub name: Name,
	/// Reader-side aliases for this fixed's name
	pub aliases: Vec<Name>,
}
impl Fixed {
	/// `name` is name of the *fixed* type, including the namespace, `size`
	/// is the size in bytes of the fixed type
	pub fn new(name: Name, size: usize) -> Self {
		Self {
			size,
			name,
			aliases: Vec::new(),
		}
	}
}

/// Logical type
///
/// <https://avro.apache.org/docs/current/specification/#logical-types>
///
/// A schema node references at most one logical type. Whether a typed view
/// is actually materialized for it depends on the
/// [`ConversionRegistry`](crate::logical::ConversionRegistry) of the datum
/// model in use.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum LogicalType {
	/// `decimal` over `bytes` or `fixed`: two's-complement unscaled value
	/// with a schema-level scale
	Decimal(Decimal),
	/// `uuid` over `string`: canonical 8-4-4-4-12 hex
	Uuid,
	/// `date` over `int`: days since the unix epoch, signed
	Date,
	/// `timestamp-millis` over `long`: milliseconds since the unix epoch,
	/// UTC
	TimestampMillis,
	/// `timestamp-micros` over `long`: microseconds since the unix epoch,
	/// UTC
	TimestampMicros,
	/// `big-integer` over `bytes`: two's-complement
	BigInteger,
	/// `instant` over `long` millis, a `string` (ISO-8601 or a `format`
	/// property), or a record `{epochSecond, nano}` / `{millis}`
	Instant,
	/// `any_temporal` over `string`: any of date, year-month, year,
	/// date-time, time
	AnyTemporal,
	/// `any` over record `{avsc: string, content: bytes}`: an arbitrary
	/// value embedded alongside its schema
	Any,
	/// A logical type that is not known or not handled in any particular way
	/// by this library.
	///
	/// **You should not match on this variant.** Logical types of this
	/// variant may turn into known logical types from one release to
	/// another; if you need to check for a specific unknown logical type,
	/// use [`as_str`](Self::as_str) instead.
	Unknown(UnknownLogicalType),
}

/// Component of a [`SchemaMut`]
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct Decimal {
	/// The scale of the decimal number, which is the number of digits to the
	/// right of the decimal point.
	pub scale: u32,
	/// The precision of the decimal number, which is the number of
	/// significant digits in the number.
	pub precision: usize,
}
impl Decimal {
	/// `scale` is the number of digits to the right of the decimal point,
	/// and `precision` is the number of significant digits in the number.
	pub fn new(scale: u32, precision: usize) -> Self {
		Self { precision, scale }
	}
}

/// Component of a [`SchemaMut`]
///
/// Represents a logical type that is not known or not handled in any
/// particular way by this library.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct UnknownLogicalType {
	/// The name of the logical type, as it appears in the schema JSON
	pub logical_type_name: String,
}
impl UnknownLogicalType {
	/// `logical_type_name` is the name of the logical type, as it appears in
	/// the schema JSON
	pub fn new(logical_type_name: impl Into<String>) -> Self {
		Self {
			logical_type_name: logical_type_name.into(),
		}
	}

	/// Gives the name of the logical type, as it appears in the schema JSON
	pub fn as_str(&self) -> &str {
		&self.logical_type_name
	}
}

impl LogicalType {
	/// The name of the logical type
	///
	/// This is the string that is used in the schema JSON to refer to this
	/// logical type, and the key under which a
	/// [`Conversion`](crate::logical::Conversion) registers.
	pub fn as_str(&self) -> &str {
		match self {
			LogicalType::Decimal(_) => "decimal",
			LogicalType::Uuid => "uuid",
			LogicalType::Date => "date",
			LogicalType::TimestampMillis => "timestamp-millis",
			LogicalType::TimestampMicros => "timestamp-micros",
			LogicalType::BigInteger => "big-integer",
			LogicalType::Instant => "instant",
			LogicalType::AnyTemporal => "any_temporal",
			LogicalType::Any => "any",
			LogicalType::Unknown(unknown_logical_type) => &unknown_logical_type.logical_type_name,
		}
	}

	pub(crate) fn from_name(name: &str, precision: Option<usize>, scale: Option<u32>) -> Self {
		match name {
			"decimal" => LogicalType::Decimal(Decimal {
				precision: precision.unwrap_or(0),
				scale: scale.unwrap_or(0),
			}),
			"uuid" => LogicalType::Uuid,
			"date" => LogicalType::Date,
			"timestamp-millis" => LogicalType::TimestampMillis,
			"timestamp-micros" => LogicalType::TimestampMicros,
			"big-integer" => LogicalType::BigInteger,
			"instant" => LogicalType::Instant,
			"any_temporal" => LogicalType::AnyTemporal,
			"any" => LogicalType::Any,
			unknown => LogicalType::Unknown(UnknownLogicalType::new(unknown)),
		}
	}
}

impl From<SchemaType> for SchemaNode {
	fn from(type_: SchemaType) -> Self {
		Self {
			type_,
			logical_type: None,
			properties: Properties::new(),
		}
	}
}

macro_rules! impl_froms_for_schema_type {
	($($variant: ident)*) => {
		$(
			impl From<$variant> for SchemaType {
				fn from(variant: $variant) -> Self {
					Self::$variant(variant)
				}
			}
			impl From<$variant> for SchemaNode {
				fn from(variant: $variant) -> Self {
					SchemaNode::new(SchemaType::$variant(variant))
				}
			}
		)*
	};
}
impl_froms_for_schema_type! { Array Map Union Record Enum Fixed }
