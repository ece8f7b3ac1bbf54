use serde::de::*;

/// What a schema node looks like in the JSON text, before name resolution
///
/// Open keys are buffered by the `flatten` below, so this model owns its
/// strings instead of borrowing them.
pub(super) enum SchemaNode {
	Type(Type),
	Ref(String),
	Object(Box<SchemaNodeObject>),
	Union(Vec<SchemaNode>),
}

#[derive(serde_derive::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub(super) enum Type {
	// Primitive types
	Null,
	Boolean,
	Int,
	Long,
	Float,
	Double,
	Bytes,
	String,
	// Complex types
	Array,
	Map,
	Record,
	/// A record that is usable as an RPC error
	Error,
	Enum,
	Fixed,
}

impl Type {
	pub(super) fn is_complex(self) -> bool {
		matches!(
			self,
			Type::Array | Type::Map | Type::Record | Type::Error | Type::Enum | Type::Fixed
		)
	}
}

#[derive(serde_derive::Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SchemaNodeObject {
	/// If there is a logical type, this can be a primitive type or a type
	/// object, otherwise it must be a complex type keyword (or an
	/// unnecessarily-nested type object).
	#[serde(rename = "type")]
	pub(super) type_: SchemaNode,
	pub(super) logical_type: Option<String>,
	/// For named types
	pub(super) name: Option<String>,
	/// For named types
	pub(super) namespace: Option<String>,
	/// For named types
	pub(super) aliases: Option<Vec<String>>,
	/// For record type
	pub(super) fields: Option<Vec<Field>>,
	/// For enum type
	pub(super) symbols: Option<Vec<String>>,
	/// For enum type: fallback symbol for schema resolution
	pub(super) default: Option<serde_json::Value>,
	/// For array type
	pub(super) items: Option<SchemaNode>,
	/// For map type
	pub(super) values: Option<SchemaNode>,
	/// For fixed type
	pub(super) size: Option<usize>,
	/// For decimal logical type
	pub(super) precision: Option<usize>,
	/// For decimal logical type
	pub(super) scale: Option<u32>,
	/// Everything else (doc, format, custom annotations...) is preserved in
	/// the node's open property bag
	#[serde(flatten)]
	pub(super) properties: serde_json::Map<String, serde_json::Value>,
}

#[derive(serde_derive::Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct Field {
	pub(super) name: String,
	#[serde(rename = "type")]
	pub(super) type_: SchemaNode,
	pub(super) default: Option<serde_json::Value>,
	pub(super) order: Option<FieldOrder>,
	pub(super) aliases: Option<Vec<String>>,
	#[serde(flatten)]
	pub(super) properties: serde_json::Map<String, serde_json::Value>,
}

#[derive(serde_derive::Deserialize, Clone, Copy, Debug)]
#[serde(rename_all = "lowercase")]
pub(super) enum FieldOrder {
	Ascending,
	Descending,
	Ignore,
}

impl From<FieldOrder> for crate::schema::FieldOrder {
	fn from(order: FieldOrder) -> Self {
		match order {
			FieldOrder::Ascending => Self::Ascending,
			FieldOrder::Descending => Self::Descending,
			FieldOrder::Ignore => Self::Ignore,
		}
	}
}

impl<'de> Deserialize<'de> for SchemaNode {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		struct SchemaNodeVisitor;
		impl<'de> Visitor<'de> for SchemaNodeVisitor {
			type Value = SchemaNode;

			fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
				write!(
					formatter,
					"A string (type) or an object with a `type` field or an array (union)"
				)
			}

			fn visit_map<A>(self, map: A) -> Result<Self::Value, A::Error>
			where
				A: MapAccess<'de>,
			{
				// That's an object.
				Ok(SchemaNode::Object(Deserialize::deserialize(
					serde::de::value::MapAccessDeserializer::new(map),
				)?))
			}

			fn visit_seq<A>(self, seq: A) -> Result<Self::Value, A::Error>
			where
				A: SeqAccess<'de>,
			{
				// That's a union.
				Ok(SchemaNode::Union(Deserialize::deserialize(
					serde::de::value::SeqAccessDeserializer::new(seq),
				)?))
			}

			fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
			where
				E: Error,
			{
				// That's a type right away, or a ref.
				Ok(
					match Type::deserialize(value::StrDeserializer::<FailedDeserialization>::new(v))
					{
						Ok(type_) => SchemaNode::Type(type_),
						Err(FailedDeserialization) => SchemaNode::Ref(v.to_owned()),
					},
				)
			}

			fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
			where
				E: Error,
			{
				Ok(
					match Type::deserialize(value::StrDeserializer::<FailedDeserialization>::new(
						v.as_str(),
					)) {
						Ok(type_) => SchemaNode::Type(type_),
						Err(FailedDeserialization) => SchemaNode::Ref(v),
					},
				)
			}
		}
		deserializer.deserialize_any(SchemaNodeVisitor)
	}
}

#[derive(thiserror::Error, Debug)]
#[error("Failed to deserialize")]
struct FailedDeserialization;
impl Error for FailedDeserialization {
	fn custom<T: std::fmt::Display>(_msg: T) -> Self {
		FailedDeserialization
	}
}
