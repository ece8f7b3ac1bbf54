use super::{model::*, schema_error};

use crate::Error;

use {serde::ser::*, std::cell::RefCell};

impl SchemaMut {
	/// Re-generate the JSON text for this schema from the graph
	///
	/// Used when the schema was built or edited via
	/// [`nodes_mut`](SchemaMut::nodes_mut) instead of parsed from text.
	pub(crate) fn serialize_to_json(&self) -> Result<String, Error> {
		serde_json::to_string(self).map_err(|e| schema_error(e))
	}
}

impl Serialize for SchemaMut {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		SerializeSchema {
			schema: self,
			named_type_written: &RefCell::new(vec![false; self.nodes.len()]),
			key: SchemaKey::from_idx(0),
		}
		.serialize(serializer)
	}
}

struct SerializeSchema<'a, K> {
	schema: &'a SchemaMut,
	/// Named types serialize their full definition once; later occurrences
	/// serialize as a name reference (this is also what keeps cyclic schemas
	/// from recursing forever)
	named_type_written: &'a RefCell<Vec<bool>>,
	key: K,
}

impl<'a, K> SerializeSchema<'a, K> {
	fn serializable<NK>(&self, key: NK) -> SerializeSchema<'a, NK> {
		SerializeSchema {
			schema: self.schema,
			named_type_written: self.named_type_written,
			key,
		}
	}
}

fn serialize_name_and_aliases<S: SerializeMap>(
	map: &mut S,
	name: &super::Name,
	aliases: &[super::Name],
) -> Result<(), S::Error> {
	map.serialize_entry("name", name.fully_qualified_name())?;
	if !aliases.is_empty() {
		map.serialize_entry(
			"aliases",
			&aliases
				.iter()
				.map(|a| a.fully_qualified_name())
				.collect::<Vec<_>>(),
		)?;
	}
	Ok(())
}

fn serialize_properties<S: SerializeMap>(map: &mut S, properties: &Properties) -> Result<(), S::Error> {
	for (k, v) in properties {
		map.serialize_entry(k, v)?;
	}
	Ok(())
}

impl Serialize for SerializeSchema<'_, SchemaKey> {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let node = self
			.schema
			.nodes
			.get(self.key.idx())
			.ok_or_else(|| <S::Error as serde::ser::Error>::custom("SchemaKey refers to non-existing node"))?;

		// Bare primitives with no annotations keep the compact string form
		if node.logical_type.is_none() && node.properties.is_empty() {
			match node.type_ {
				SchemaType::Null => return serializer.serialize_str("null"),
				SchemaType::Boolean => return serializer.serialize_str("boolean"),
				SchemaType::Int => return serializer.serialize_str("int"),
				SchemaType::Long => return serializer.serialize_str("long"),
				SchemaType::Float => return serializer.serialize_str("float"),
				SchemaType::Double => return serializer.serialize_str("double"),
				SchemaType::Bytes => return serializer.serialize_str("bytes"),
				SchemaType::String => return serializer.serialize_str("string"),
				_ => {}
			}
		}

		if let Some(name) = node.type_.name() {
			let already_written = {
				let mut written = self.named_type_written.borrow_mut();
				std::mem::replace(&mut written[self.key.idx()], true)
			};
			if already_written {
				return serializer.serialize_str(name.fully_qualified_name());
			}
		}

		let logical_entries = |map: &mut S::SerializeMap| -> Result<(), S::Error> {
			if let Some(logical_type) = &node.logical_type {
				map.serialize_entry("logicalType", logical_type.as_str())?;
				if let LogicalType::Decimal(decimal) = logical_type {
					map.serialize_entry("precision", &decimal.precision)?;
					map.serialize_entry("scale", &decimal.scale)?;
				}
			}
			Ok(())
		};

		match node.type_ {
			SchemaType::Null
			| SchemaType::Boolean
			| SchemaType::Int
			| SchemaType::Long
			| SchemaType::Float
			| SchemaType::Double
			| SchemaType::Bytes
			| SchemaType::String => {
				let mut map = serializer.serialize_map(None)?;
				map.serialize_entry("type", node.type_.type_label())?;
				logical_entries(&mut map)?;
				serialize_properties(&mut map, &node.properties)?;
				map.end()
			}
			SchemaType::Array(ref array) => {
				let mut map = serializer.serialize_map(None)?;
				map.serialize_entry("type", "array")?;
				map.serialize_entry("items", &self.serializable(array.items))?;
				logical_entries(&mut map)?;
				serialize_properties(&mut map, &node.properties)?;
				map.end()
			}
			SchemaType::Map(ref map_type) => {
				let mut map = serializer.serialize_map(None)?;
				map.serialize_entry("type", "map")?;
				map.serialize_entry("values", &self.serializable(map_type.values))?;
				logical_entries(&mut map)?;
				serialize_properties(&mut map, &node.properties)?;
				map.end()
			}
			SchemaType::Union(ref union) => {
				let mut seq = serializer.serialize_seq(Some(union.variants.len()))?;
				for &union_variant_key in &union.variants {
					seq.serialize_element(&self.serializable(union_variant_key))?;
				}
				seq.end()
			}
			SchemaType::Record(ref record) => {
				let mut map = serializer.serialize_map(None)?;
				map.serialize_entry("type", if record.is_error { "error" } else { "record" })?;
				serialize_name_and_aliases(&mut map, &record.name, &record.aliases)?;
				map.serialize_entry("fields", &self.serializable(record.fields.as_slice()))?;
				logical_entries(&mut map)?;
				serialize_properties(&mut map, &node.properties)?;
				map.end()
			}
			SchemaType::Enum(ref enum_) => {
				let mut map = serializer.serialize_map(None)?;
				map.serialize_entry("type", "enum")?;
				serialize_name_and_aliases(&mut map, &enum_.name, &enum_.aliases)?;
				map.serialize_entry("symbols", &enum_.symbols)?;
				if let Some(default) = &enum_.default {
					map.serialize_entry("default", default)?;
				}
				logical_entries(&mut map)?;
				serialize_properties(&mut map, &node.properties)?;
				map.end()
			}
			SchemaType::Fixed(ref fixed) => {
				let mut map = serializer.serialize_map(None)?;
				map.serialize_entry("type", "fixed")?;
				serialize_name_and_aliases(&mut map, &fixed.name, &fixed.aliases)?;
				map.serialize_entry("size", &fixed.size)?;
				logical_entries(&mut map)?;
				serialize_properties(&mut map, &node.properties)?;
				map.end()
			}
		}
	}
}

impl Serialize for SerializeSchema<'_, &[RecordField]> {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut seq = serializer.serialize_seq(Some(self.key.len()))?;
		for field in self.key {
			seq.serialize_element(&self.serializable(field))?;
		}
		seq.end()
	}
}

impl Serialize for SerializeSchema<'_, &RecordField> {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut map = serializer.serialize_map(None)?;
		map.serialize_entry("name", &self.key.name)?;
		map.serialize_entry("type", &self.serializable(self.key.type_))?;
		if let Some(default) = &self.key.default {
			map.serialize_entry("default", default)?;
		}
		if self.key.order != FieldOrder::Ascending {
			map.serialize_entry("order", self.key.order.as_str())?;
		}
		if !self.key.aliases.is_empty() {
			map.serialize_entry("aliases", &self.key.aliases)?;
		}
		serialize_properties(&mut map, &self.key.properties)?;
		map.end()
	}
}
