//! The generic datum tree produced by decoders and consumed by encoders

use {
	chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc},
	num_bigint::BigInt,
	std::collections::HashMap,
};

/// A generic Avro datum
///
/// This is what [`DatumReader`](crate::de::DatumReader) produces and what
/// [`DatumWriter`](crate::ser::DatumWriter) consumes. The first group of
/// variants mirrors the wire types of the schema; the second group holds the
/// typed views produced by registered
/// [`Conversion`](crate::logical::Conversion)s.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
	/// A `null` datum
	Null,
	/// A `boolean` datum
	Boolean(bool),
	/// An `int` datum
	Int(i32),
	/// A `long` datum
	Long(i64),
	/// A `float` datum
	Float(f32),
	/// A `double` datum
	Double(f64),
	/// A `bytes` datum
	Bytes(Vec<u8>),
	/// A `string` datum
	String(String),
	/// A `fixed` datum - the length always equals the schema-declared size
	Fixed(Vec<u8>),
	/// An `enum` datum: ordinal in the reader's symbol table, plus the symbol
	Enum(usize, String),
	/// An `array` datum
	Array(Vec<Value>),
	/// A `map` datum (keys are always strings in Avro)
	Map(HashMap<String, Value>),
	/// A `union` datum: resolved branch index in the reader's union, plus the
	/// inner value
	Union(usize, Box<Value>),
	/// A `record` datum, fields in declaration order
	Record(Vec<(String, Value)>),

	// Typed views over primitive wire values, produced by conversions
	/// `date` logical type over `int` (days since the unix epoch)
	Date(NaiveDate),
	/// `timestamp-millis` logical type over `long`
	TimestampMillis(DateTime<Utc>),
	/// `timestamp-micros` logical type over `long`
	TimestampMicros(DateTime<Utc>),
	/// `decimal` logical type over `bytes` or `fixed`
	Decimal(rust_decimal::Decimal),
	/// `big-integer` logical type over `bytes` (two's-complement)
	BigInteger(BigInt),
	/// `uuid` logical type over `string`
	Uuid(uuid::Uuid),
	/// `instant` logical type (long millis, string, or
	/// `{epochSecond, nano}` record on the wire)
	Instant(DateTime<Utc>),
	/// `any_temporal` logical type over `string`
	Temporal(Temporal),
	/// `any` logical type: an arbitrary value embedded alongside its schema
	Any(Box<AnyValue>),
}

/// The narrowest temporal shape that round-trips the parsed text
///
/// Produced by the `any_temporal` logical type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Temporal {
	/// A plain calendar date (`2024-02-29`)
	Date(NaiveDate),
	/// A year and month (`2024-02`)
	YearMonth { year: i32, month: u32 },
	/// A bare year (`2024`)
	Year(i32),
	/// A date with a time of day (`2024-02-29T12:34:56`)
	DateTime(NaiveDateTime),
	/// A bare time of day (`12:34:56`)
	Time(NaiveTime),
}

/// Payload of the `any` escape logical type
///
/// The embedded value travels with the JSON text of its own schema, so a
/// reader that knows nothing about the value's shape can still decode it.
#[derive(Clone, Debug, PartialEq)]
pub struct AnyValue {
	/// Minified JSON text of the embedded value's schema
	pub schema_json: String,
	/// The embedded value, decoded under that schema
	pub value: Value,
}

impl Value {
	/// Name of this datum's variant, for diagnostics
	pub(crate) fn type_name(&self) -> &'static str {
		match self {
			Value::Null => "null",
			Value::Boolean(_) => "boolean",
			Value::Int(_) => "int",
			Value::Long(_) => "long",
			Value::Float(_) => "float",
			Value::Double(_) => "double",
			Value::Bytes(_) => "bytes",
			Value::String(_) => "string",
			Value::Fixed(_) => "fixed",
			Value::Enum(_, _) => "enum",
			Value::Array(_) => "array",
			Value::Map(_) => "map",
			Value::Union(_, _) => "union",
			Value::Record(_) => "record",
			Value::Date(_) => "date",
			Value::TimestampMillis(_) => "timestamp-millis",
			Value::TimestampMicros(_) => "timestamp-micros",
			Value::Decimal(_) => "decimal",
			Value::BigInteger(_) => "big-integer",
			Value::Uuid(_) => "uuid",
			Value::Instant(_) => "instant",
			Value::Temporal(_) => "any_temporal",
			Value::Any(_) => "any",
		}
	}
}

impl From<&str> for Value {
	fn from(s: &str) -> Self {
		Value::String(s.to_owned())
	}
}

macro_rules! impl_froms_for_value {
	($($from: ty => $variant: ident,)*) => {
		$(
			impl From<$from> for Value {
				fn from(v: $from) -> Self {
					Value::$variant(v.into())
				}
			}
		)*
	};
}
impl_froms_for_value! {
	bool => Boolean,
	i32 => Int,
	i64 => Long,
	f32 => Float,
	f64 => Double,
	Vec<u8> => Bytes,
	String => String,
	Vec<Value> => Array,
	HashMap<String, Value> => Map,
}
