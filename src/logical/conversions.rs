//! The standard conversion catalogue

use super::{i128_from_two_complement, minimal_two_complement, Conversion, ConversionContext};

use crate::{
	schema::{LogicalType, SchemaType},
	value::{AnyValue, Temporal},
	Error, ErrorKind, Value,
};

use {
	chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc},
	num_bigint::BigInt,
	num_traits::ToPrimitive,
};

fn logical_error(message: impl std::fmt::Display) -> Error {
	Error::custom(ErrorKind::LogicalType, message)
}

fn unconvertible(conversion: &dyn Conversion, value: &Value) -> Error {
	logical_error(format_args!(
		"The {:?} conversion cannot handle a {} value",
		conversion.name(),
		value.type_name()
	))
}

/// Days since the unix epoch, in `num_days_from_ce` terms
const EPOCH_FROM_CE: i32 = 719_163;

/// `date` over `int`: signed epoch-day
pub struct DateConversion;

impl Conversion for DateConversion {
	fn name(&self) -> &'static str {
		"date"
	}

	fn to_wire(&self, typed: &Value, _ctx: ConversionContext<'_>) -> Result<Value, Error> {
		match typed {
			Value::Date(date) => Ok(Value::Int(date.num_days_from_ce() - EPOCH_FROM_CE)),
			Value::Int(days) => Ok(Value::Int(*days)),
			other => Err(unconvertible(self, other)),
		}
	}

	fn from_wire(&self, wire: Value, _ctx: ConversionContext<'_>) -> Result<Value, Error> {
		match wire {
			Value::Int(days) => days
				.checked_add(EPOCH_FROM_CE)
				.and_then(NaiveDate::from_num_days_from_ce_opt)
				.map(Value::Date)
				.ok_or_else(|| logical_error(format_args!("Epoch day {days} is out of range"))),
			other => Err(unconvertible(self, &other)),
		}
	}
}

/// `timestamp-millis` over `long`: epoch offset in UTC
pub struct TimestampMillisConversion;

impl Conversion for TimestampMillisConversion {
	fn name(&self) -> &'static str {
		"timestamp-millis"
	}

	fn to_wire(&self, typed: &Value, _ctx: ConversionContext<'_>) -> Result<Value, Error> {
		match typed {
			Value::TimestampMillis(ts) | Value::Instant(ts) => Ok(Value::Long(ts.timestamp_millis())),
			Value::Long(ms) => Ok(Value::Long(*ms)),
			other => Err(unconvertible(self, other)),
		}
	}

	fn from_wire(&self, wire: Value, _ctx: ConversionContext<'_>) -> Result<Value, Error> {
		match wire {
			Value::Long(ms) => DateTime::<Utc>::from_timestamp_millis(ms)
				.map(Value::TimestampMillis)
				.ok_or_else(|| logical_error(format_args!("Timestamp {ms}ms is out of range"))),
			other => Err(unconvertible(self, &other)),
		}
	}
}

/// `timestamp-micros` over `long`: epoch offset in UTC
pub struct TimestampMicrosConversion;

impl Conversion for TimestampMicrosConversion {
	fn name(&self) -> &'static str {
		"timestamp-micros"
	}

	fn to_wire(&self, typed: &Value, _ctx: ConversionContext<'_>) -> Result<Value, Error> {
		match typed {
			Value::TimestampMicros(ts) | Value::Instant(ts) => Ok(Value::Long(ts.timestamp_micros())),
			Value::Long(us) => Ok(Value::Long(*us)),
			other => Err(unconvertible(self, other)),
		}
	}

	fn from_wire(&self, wire: Value, _ctx: ConversionContext<'_>) -> Result<Value, Error> {
		match wire {
			Value::Long(us) => DateTime::<Utc>::from_timestamp_micros(us)
				.map(Value::TimestampMicros)
				.ok_or_else(|| logical_error(format_args!("Timestamp {us}us is out of range"))),
			other => Err(unconvertible(self, &other)),
		}
	}
}

/// `decimal` over `bytes` or `fixed`: two's-complement unscaled value, with
/// the scale on the schema
pub struct DecimalConversion;

impl DecimalConversion {
	fn schema_scale(ctx: ConversionContext<'_>) -> Result<u32, Error> {
		match &ctx.node().logical_type {
			Some(LogicalType::Decimal(decimal)) => Ok(decimal.scale),
			_ => Err(logical_error("Schema node does not declare a decimal logical type")),
		}
	}
}

impl Conversion for DecimalConversion {
	fn name(&self) -> &'static str {
		"decimal"
	}

	fn to_wire(&self, typed: &Value, ctx: ConversionContext<'_>) -> Result<Value, Error> {
		let mut decimal = match typed {
			Value::Decimal(decimal) => *decimal,
			passthrough @ (Value::Bytes(_) | Value::Fixed(_)) => return Ok(passthrough.clone()),
			other => return Err(unconvertible(self, other)),
		};
		let scale = Self::schema_scale(ctx)?;
		decimal.rescale(scale);
		if decimal.scale() != scale {
			return Err(logical_error(
				"Decimal number cannot be scaled to fit in schema scale \
					with a 96 bit mantissa (number or scale too large)",
			));
		}
		let minimal = minimal_two_complement(decimal.mantissa());
		match &ctx.node().type_ {
			SchemaType::Bytes => Ok(Value::Bytes(minimal)),
			SchemaType::Fixed(fixed) => {
				if minimal.len() > fixed.size {
					return Err(logical_error(format_args!(
						"Decimal number does not fit in `fixed` field size \
							(fixed size: {}, required: {})",
						fixed.size,
						minimal.len()
					)));
				}
				let fill = if minimal.first().map_or(false, |&b| b & 0x80 != 0) {
					0xFF
				} else {
					0x00
				};
				let mut padded = vec![fill; fixed.size - minimal.len()];
				padded.extend_from_slice(&minimal);
				Ok(Value::Fixed(padded))
			}
			_ => Err(logical_error("Decimal logical type requires bytes or fixed underneath")),
		}
	}

	fn from_wire(&self, wire: Value, ctx: ConversionContext<'_>) -> Result<Value, Error> {
		let scale = Self::schema_scale(ctx)?;
		match wire {
			Value::Bytes(bytes) | Value::Fixed(bytes) => {
				let unscaled = i128_from_two_complement(&bytes).ok_or_else(|| {
					logical_error(format_args!(
						"Decimal unscaled value of {} bytes does not fit in 128 bits",
						bytes.len()
					))
				})?;
				rust_decimal::Decimal::try_from_i128_with_scale(unscaled, scale)
					.map(Value::Decimal)
					.map_err(|e| logical_error(format_args!("Decimal value out of range: {e}")))
			}
			other => Err(unconvertible(self, &other)),
		}
	}

	fn direct_json_encode(
		&self,
		typed: &Value,
		_ctx: ConversionContext<'_>,
	) -> Result<Option<serde_json::Value>, Error> {
		// Decimals may be written as plain JSON numbers
		match typed {
			Value::Decimal(decimal) => Ok(decimal
				.to_f64()
				.and_then(serde_json::Number::from_f64)
				.map(serde_json::Value::Number)),
			_ => Ok(None),
		}
	}

	fn has_direct_json_decode(&self) -> bool {
		true
	}

	/// Decimals are accepted as plain numbers, as decimal text, or as the
	/// ISO-8859-1 spelling of the unscaled-value bytes
	fn direct_json_decode(
		&self,
		raw: serde_json::Value,
		ctx: ConversionContext<'_>,
	) -> Result<Value, Error> {
		let scale = Self::schema_scale(ctx)?;
		match raw {
			serde_json::Value::Number(n) => n
				.to_string()
				.parse()
				.map(Value::Decimal)
				.map_err(|e| logical_error(format_args!("Cannot read {n} as a decimal: {e}"))),
			serde_json::Value::String(s) => {
				if let Ok(decimal) = s.parse() {
					return Ok(Value::Decimal(decimal));
				}
				let unscaled = crate::json::string_to_bytes(&s)
					.and_then(|bytes| i128_from_two_complement(&bytes))
					.ok_or_else(|| {
						logical_error(format_args!("Cannot read {s:?} as a decimal"))
					})?;
				rust_decimal::Decimal::try_from_i128_with_scale(unscaled, scale)
					.map(Value::Decimal)
					.map_err(|e| logical_error(format_args!("Decimal value out of range: {e}")))
			}
			other => Err(logical_error(format_args!(
				"Expected a JSON number or string for a decimal, found {other}"
			))),
		}
	}
}

/// `big-integer` over `bytes`: two's-complement
pub struct BigIntegerConversion;

impl Conversion for BigIntegerConversion {
	fn name(&self) -> &'static str {
		"big-integer"
	}

	fn to_wire(&self, typed: &Value, _ctx: ConversionContext<'_>) -> Result<Value, Error> {
		match typed {
			Value::BigInteger(big) => Ok(Value::Bytes(big.to_signed_bytes_be())),
			Value::Bytes(bytes) => Ok(Value::Bytes(bytes.clone())),
			other => Err(unconvertible(self, other)),
		}
	}

	fn from_wire(&self, wire: Value, _ctx: ConversionContext<'_>) -> Result<Value, Error> {
		match wire {
			Value::Bytes(bytes) => Ok(Value::BigInteger(BigInt::from_signed_bytes_be(&bytes))),
			other => Err(unconvertible(self, &other)),
		}
	}

	fn direct_json_encode(
		&self,
		typed: &Value,
		_ctx: ConversionContext<'_>,
	) -> Result<Option<serde_json::Value>, Error> {
		// Small enough values may be written as plain JSON integers
		match typed {
			Value::BigInteger(big) => Ok(big.to_i64().map(|v| serde_json::Value::Number(v.into()))),
			_ => Ok(None),
		}
	}
}

/// `uuid` over `string`: canonical 8-4-4-4-12 hex
pub struct UuidConversion;

impl Conversion for UuidConversion {
	fn name(&self) -> &'static str {
		"uuid"
	}

	fn to_wire(&self, typed: &Value, _ctx: ConversionContext<'_>) -> Result<Value, Error> {
		match typed {
			Value::Uuid(uuid) => Ok(Value::String(uuid.hyphenated().to_string())),
			Value::String(s) => Ok(Value::String(s.clone())),
			other => Err(unconvertible(self, other)),
		}
	}

	fn from_wire(&self, wire: Value, _ctx: ConversionContext<'_>) -> Result<Value, Error> {
		match wire {
			Value::String(s) => uuid::Uuid::parse_str(&s)
				.map(Value::Uuid)
				.map_err(|e| logical_error(format_args!("Invalid UUID {s:?}: {e}"))),
			other => Err(unconvertible(self, &other)),
		}
	}
}

/// `instant`: long millis, ISO-8601 (or `format` property) string, or a
/// record `{epochSecond, nano}` / `{millis}`
pub struct InstantConversion;

impl Conversion for InstantConversion {
	fn name(&self) -> &'static str {
		"instant"
	}

	fn to_wire(&self, typed: &Value, ctx: ConversionContext<'_>) -> Result<Value, Error> {
		let instant = match typed {
			Value::Instant(ts) | Value::TimestampMillis(ts) | Value::TimestampMicros(ts) => *ts,
			passthrough @ (Value::Long(_) | Value::String(_) | Value::Record(_)) => {
				return Ok(passthrough.clone());
			}
			other => return Err(unconvertible(self, other)),
		};
		match &ctx.node().type_ {
			SchemaType::Long => Ok(Value::Long(instant.timestamp_millis())),
			SchemaType::String => Ok(Value::String(match ctx.string_property("format") {
				Some(format) => instant.naive_utc().format(format).to_string(),
				None => instant.to_rfc3339_opts(SecondsFormat::Millis, true),
			})),
			SchemaType::Record(record) => {
				let fields = record
					.fields
					.iter()
					.map(|field| {
						Ok((
							field.name.clone(),
							match field.name.as_str() {
								"epochSecond" => Value::Long(instant.timestamp()),
								"nano" => Value::Int(instant.timestamp_subsec_nanos() as i32),
								"millis" => Value::Long(instant.timestamp_millis()),
								other => {
									return Err(logical_error(format_args!(
										"Unknown field {other:?} on instant record"
									)));
								}
							},
						))
					})
					.collect::<Result<_, Error>>()?;
				Ok(Value::Record(fields))
			}
			_ => Err(logical_error(
				"Instant logical type requires long, string or record underneath",
			)),
		}
	}

	fn from_wire(&self, wire: Value, ctx: ConversionContext<'_>) -> Result<Value, Error> {
		match wire {
			Value::Long(ms) => DateTime::<Utc>::from_timestamp_millis(ms)
				.map(Value::Instant)
				.ok_or_else(|| logical_error(format_args!("Instant {ms}ms is out of range"))),
			Value::String(s) => match ctx.string_property("format") {
				Some(format) => NaiveDateTime::parse_from_str(&s, format)
					.map(|naive| Value::Instant(naive.and_utc()))
					.map_err(|e| logical_error(format_args!("Cannot parse instant {s:?}: {e}"))),
				None => DateTime::parse_from_rfc3339(&s)
					.map(|parsed| Value::Instant(parsed.with_timezone(&Utc)))
					.map_err(|e| logical_error(format_args!("Cannot parse instant {s:?}: {e}"))),
			},
			Value::Record(fields) => {
				let field = |name: &str| {
					fields
						.iter()
						.find(|(field_name, _)| field_name == name)
						.map(|(_, value)| value)
				};
				if let Some(Value::Long(ms)) = field("millis") {
					return DateTime::<Utc>::from_timestamp_millis(*ms)
						.map(Value::Instant)
						.ok_or_else(|| logical_error(format_args!("Instant {ms}ms is out of range")));
				}
				let Some(Value::Long(seconds)) = field("epochSecond") else {
					return Err(logical_error(
						"Instant record must carry `epochSecond` (long) or `millis` (long)",
					));
				};
				let nanos = match field("nano") {
					Some(Value::Int(nanos)) => *nanos,
					Some(Value::Long(nanos)) => *nanos as i32,
					_ => 0,
				};
				DateTime::<Utc>::from_timestamp(*seconds, nanos as u32)
					.map(Value::Instant)
					.ok_or_else(|| {
						logical_error(format_args!("Instant {seconds}s + {nanos}ns is out of range"))
					})
			}
			other => Err(unconvertible(self, &other)),
		}
	}
}

/// `any_temporal` over `string`: the narrowest of date, year-month, year,
/// date-time and time that round-trips the text
pub struct AnyTemporalConversion;

fn parse_temporal(s: &str) -> Option<Temporal> {
	if let Ok(date_time) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
		return Some(Temporal::DateTime(date_time));
	}
	if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
		return Some(Temporal::Date(date));
	}
	if let Some((year, month)) = s.split_once('-') {
		if year.len() == 4 && month.len() == 2 {
			if let (Ok(year), Ok(month @ 1..=12)) = (year.parse(), month.parse()) {
				return Some(Temporal::YearMonth { year, month });
			}
		}
	}
	if s.len() == 4 {
		if let Ok(year) = s.parse() {
			return Some(Temporal::Year(year));
		}
	}
	if let Ok(time) = NaiveTime::parse_from_str(s, "%H:%M:%S%.f") {
		return Some(Temporal::Time(time));
	}
	None
}

fn format_temporal(temporal: &Temporal) -> String {
	match temporal {
		Temporal::Date(date) => date.format("%Y-%m-%d").to_string(),
		Temporal::YearMonth { year, month } => format!("{year:04}-{month:02}"),
		Temporal::Year(year) => format!("{year:04}"),
		Temporal::DateTime(date_time) => date_time.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
		Temporal::Time(time) => time.format("%H:%M:%S%.f").to_string(),
	}
}

impl Conversion for AnyTemporalConversion {
	fn name(&self) -> &'static str {
		"any_temporal"
	}

	fn to_wire(&self, typed: &Value, _ctx: ConversionContext<'_>) -> Result<Value, Error> {
		match typed {
			Value::Temporal(temporal) => Ok(Value::String(format_temporal(temporal))),
			Value::Date(date) => Ok(Value::String(format_temporal(&Temporal::Date(*date)))),
			Value::String(s) => Ok(Value::String(s.clone())),
			other => Err(unconvertible(self, other)),
		}
	}

	fn from_wire(&self, wire: Value, _ctx: ConversionContext<'_>) -> Result<Value, Error> {
		match wire {
			Value::String(s) => parse_temporal(&s).map(Value::Temporal).ok_or_else(|| {
				logical_error(format_args!("{s:?} is not a date, year-month, year, date-time or time"))
			}),
			other => Err(unconvertible(self, &other)),
		}
	}
}

/// `any` over record `{avsc: string, content: bytes}`: an arbitrary value
/// embedded alongside its own schema
///
/// The binary form stores `content` as the binary-encoded value under the
/// embedded schema; the JSON form stores `content` as inline JSON and
/// `avsc` as the schema's JSON text.
pub struct AnyConversion;

impl AnyConversion {
	fn embedded_schema(json: &str) -> Result<crate::Schema, Error> {
		json.parse()
			.map_err(|e| Error::logical("Cannot parse embedded `any` schema", e))
	}
}

impl Conversion for AnyConversion {
	fn name(&self) -> &'static str {
		"any"
	}

	fn to_wire(&self, typed: &Value, ctx: ConversionContext<'_>) -> Result<Value, Error> {
		match typed {
			Value::Any(any) => {
				let schema = Self::embedded_schema(&any.schema_json)?;
				let content = crate::to_datum_vec(&any.value, &schema, ctx.config)
					.map_err(|e| Error::logical("Cannot encode embedded `any` value", e))?;
				Ok(Value::Record(vec![
					("avsc".to_owned(), Value::String(schema.json().to_owned())),
					("content".to_owned(), Value::Bytes(content)),
				]))
			}
			Value::Record(_) => Ok(typed.clone()),
			other => Err(unconvertible(self, other)),
		}
	}

	fn from_wire(&self, wire: Value, ctx: ConversionContext<'_>) -> Result<Value, Error> {
		let Value::Record(fields) = wire else {
			return Err(unconvertible(self, &wire));
		};
		let mut avsc = None;
		let mut content = None;
		for (name, value) in fields {
			match (name.as_str(), value) {
				("avsc", Value::String(s)) => avsc = Some(s),
				("content", Value::Bytes(b)) => content = Some(b),
				_ => {}
			}
		}
		let (Some(avsc), Some(content)) = (avsc, content) else {
			return Err(logical_error(
				"`any` record must carry `avsc` (string) and `content` (bytes)",
			));
		};
		let schema = Self::embedded_schema(&avsc)?;
		let value = crate::from_datum_slice(&content, &schema, ctx.config)
			.map_err(|e| Error::logical("Cannot decode embedded `any` value", e))?;
		Ok(Value::Any(Box::new(AnyValue {
			schema_json: schema.json().to_owned(),
			value,
		})))
	}

	fn has_direct_json_decode(&self) -> bool {
		true
	}

	fn direct_json_decode(
		&self,
		raw: serde_json::Value,
		ctx: ConversionContext<'_>,
	) -> Result<Value, Error> {
		let serde_json::Value::Object(entries) = raw else {
			return Err(logical_error("`any` JSON form must be an object"));
		};
		let Some(avsc) = entries.get("avsc").and_then(|v| v.as_str()) else {
			return Err(logical_error("`any` JSON form must carry `avsc` as a string"));
		};
		let Some(content) = entries.get("content") else {
			return Err(logical_error("`any` JSON form must carry `content`"));
		};
		let schema = Self::embedded_schema(avsc)?;
		let grammar = crate::json::JsonGrammar::new(&schema);
		let mut decoder =
			crate::json::JsonDecoder::from_value(&grammar, content, crate::json::JsonMode::Strict);
		let value = crate::de::DatumReader::new(&schema, ctx.config)
			.read(&mut decoder)
			.map_err(|e| Error::logical("Cannot decode embedded `any` value", e))?;
		Ok(Value::Any(Box::new(AnyValue {
			schema_json: schema.json().to_owned(),
			value,
		})))
	}

	fn direct_json_encode(
		&self,
		typed: &Value,
		ctx: ConversionContext<'_>,
	) -> Result<Option<serde_json::Value>, Error> {
		match typed {
			Value::Any(any) => {
				let schema = Self::embedded_schema(&any.schema_json)?;
				let content = crate::to_json_value(&any.value, &schema, ctx.config)
					.map_err(|e| Error::logical("Cannot encode embedded `any` value", e))?;
				let mut entries = serde_json::Map::with_capacity(2);
				entries.insert(
					"avsc".to_owned(),
					serde_json::Value::String(schema.json().to_owned()),
				);
				entries.insert("content".to_owned(), content);
				Ok(Some(serde_json::Value::Object(entries)))
			}
			_ => Ok(None),
		}
	}
}
