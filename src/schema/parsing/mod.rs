mod raw;

use super::{model::*, schema_error, Name};

use crate::Error;

use std::collections::HashMap;

const LATE_NAME_LOOKUP_REMAP_BIT: usize = 1usize << (usize::BITS - 1);

struct SchemaConstructionState<'a> {
	nodes: Vec<SchemaNode>,
	names: HashMap<NameKey<'a>, usize>,
	unresolved_names: Vec<NameKey<'a>>,
}

impl std::str::FromStr for SchemaMut {
	type Err = Error;
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let mut state = SchemaConstructionState {
			nodes: Vec::new(),
			names: HashMap::new(),
			unresolved_names: Vec::new(),
		};

		let raw_schema: raw::SchemaNode =
			serde_json::from_str(s).map_err(|e| schema_error(e))?;

		state.register_node(&raw_schema, None)?;

		// Support for unordered name definitions
		if !state.unresolved_names.is_empty() {
			let resolved_names: Vec<SchemaKey> = state
				.unresolved_names
				.iter()
				.map(|name| {
					state
						.names
						.get(name)
						.ok_or_else(|| {
							schema_error(format_args!(
								"The Schema contains an unknown reference: {}",
								name,
							))
						})
						.map(|&idx| SchemaKey { idx })
				})
				.collect::<Result<_, _>>()?;
			let fix_key = |key: &mut SchemaKey| {
				if key.idx & LATE_NAME_LOOKUP_REMAP_BIT != 0 {
					*key = resolved_names[key.idx ^ LATE_NAME_LOOKUP_REMAP_BIT];
				}
			};
			for schema_node in &mut state.nodes {
				match &mut schema_node.type_ {
					SchemaType::Array(Array { items: key }) | SchemaType::Map(Map { values: key }) => {
						fix_key(key)
					}
					SchemaType::Union(union) => union.variants.iter_mut().for_each(fix_key),
					SchemaType::Record(record) => {
						record.fields.iter_mut().for_each(|f| fix_key(&mut f.type_))
					}
					SchemaType::Null
					| SchemaType::Boolean
					| SchemaType::Int
					| SchemaType::Long
					| SchemaType::Float
					| SchemaType::Double
					| SchemaType::Bytes
					| SchemaType::String
					| SchemaType::Enum(_)
					| SchemaType::Fixed(_) => {}
				}
			}
		}

		Ok(Self {
			nodes: state.nodes,
			schema_json: Some(
				String::from_utf8({
					// Sanitize & minify json, preserving all keys.
					let mut serializer = serde_json::Serializer::new(Vec::new());
					serde_transcode::transcode(
						&mut serde_json::Deserializer::from_str(s),
						&mut serializer,
					)
					.map_err(|e| schema_error(e))?;
					serializer.into_inner()
				})
				.map_err(|e| {
					schema_error(format_args!(
						"serde_json should not emit invalid UTF-8 but got {e}"
					))
				})?,
			),
		})
	}
}

impl<'a> SchemaConstructionState<'a> {
	fn register_node(
		&mut self,
		raw_schema: &'a raw::SchemaNode,
		enclosing_namespace: Option<&'a str>,
	) -> Result<SchemaKey, Error> {
		Ok(match *raw_schema {
			raw::SchemaNode::Type(type_) => {
				if type_.is_complex() {
					return Err(schema_error(format_args!(
						"Expected primitive type name, but got {:?} as type which is a complex \
							type, so should be in an object.",
						type_
					)));
				}
				let idx = self.nodes.len();
				self.nodes.push(SchemaNode::new(primitive_type(type_)));
				SchemaKey { idx }
			}
			raw::SchemaNode::Object(ref object) => self.register_object(object, enclosing_namespace)?,
			raw::SchemaNode::Union(ref union_schemas) => {
				let idx = self.nodes.len();
				self.nodes.push(SchemaNode::new(SchemaType::Null)); // Reserve the spot for us
				let new_node = SchemaNode::new(SchemaType::Union(Union {
					variants: union_schemas
						.iter()
						.map(|schema| self.register_node(schema, enclosing_namespace))
						.collect::<Result<_, _>>()?,
				}));
				self.nodes[idx] = new_node;
				SchemaKey { idx }
			}
			raw::SchemaNode::Ref(ref reference) => {
				// This is supposed to be the fullname of a previous named
				// type. According to the spec the type definition should
				// always be parsed before, but we support even if it's
				// unordered because we're not in 1980 anymore.
				let name_key = if let Some((namespace, name)) = reference.rsplit_once('.') {
					NameKey {
						namespace: Some(namespace).filter(|&s| !s.is_empty()),
						name,
					}
				} else {
					NameKey {
						namespace: enclosing_namespace,
						name: reference,
					}
				};
				match self.names.get(&name_key) {
					Some(&idx) => SchemaKey { idx },
					None => {
						let idx = self.unresolved_names.len();
						self.unresolved_names.push(name_key);
						SchemaKey {
							idx: idx | LATE_NAME_LOOKUP_REMAP_BIT,
						}
					}
				}
			}
		})
	}

	fn register_object(
		&mut self,
		object: &'a raw::SchemaNodeObject,
		enclosing_namespace: Option<&'a str>,
	) -> Result<SchemaKey, Error> {
		let idx = self.nodes.len();

		// Register name->node idx to the name HashMap
		let name_key = if let Some(ref name) = object.name {
			let name: &str = name;
			let name_key = if let Some((namespace, name)) = name.rsplit_once('.') {
				NameKey {
					namespace: Some(namespace).filter(|&s| !s.is_empty()),
					name,
				}
			} else {
				NameKey {
					namespace: match object.namespace {
						Some(ref namespace) => {
							// If the object explicitly specifies an empty
							// string as namespace, "this indicates the null
							// namespace" (aka no namespace)
							Some(namespace.as_str()).filter(|&s| !s.is_empty())
						}
						None => enclosing_namespace,
					},
					name,
				}
			};
			if self.names.insert(name_key, idx).is_some() {
				return Err(schema_error(format_args!(
					"The Schema contains duplicate definitions for {}",
					name_key
				)));
			}
			Some(name_key)
		} else {
			None
		};
		let name = |type_: raw::Type| match name_key {
			None => Err(schema_error(format_args!("Missing name for type {:?}", type_))),
			Some(name_key) => Ok((name_key.name(), name_key)),
		};
		let aliases = || -> Vec<Name> {
			object
				.aliases
				.as_deref()
				.unwrap_or(&[])
				.iter()
				.map(|alias| qualify_alias(alias, name_key.as_ref().and_then(|n| n.namespace)))
				.collect()
		};

		macro_rules! field {
			($type_: ident $name: ident) => {
				match &object.$name {
					Some(v) => v,
					_ => {
						return Err(schema_error(format_args!(
							concat!("Missing field `", stringify!($name), "` on type {:?}"),
							$type_
						)));
					}
				}
			};
		}

		self.nodes.push(SchemaNode::new(SchemaType::Null)); // Reserve the spot for us

		let type_ = match object.type_ {
			raw::SchemaNode::Type(t @ raw::Type::Array) => SchemaType::Array(Array {
				items: self.register_node(field!(t items), enclosing_namespace)?,
			}),
			raw::SchemaNode::Type(t @ raw::Type::Map) => SchemaType::Map(Map {
				values: self.register_node(field!(t values), enclosing_namespace)?,
			}),
			raw::SchemaNode::Type(t @ (raw::Type::Record | raw::Type::Error)) => {
				let (name, name_key) = name(t)?;
				SchemaType::Record(Record {
					fields: field!(t fields)
						.iter()
						.enumerate()
						.map(|(position, field)| {
							Ok(RecordField {
								name: field.name.clone(),
								type_: self.register_node(&field.type_, name_key.namespace)?,
								default: field.default.clone(),
								order: field.order.map_or_else(Default::default, Into::into),
								aliases: field.aliases.clone().unwrap_or_default(),
								position,
								properties: field.properties.clone(),
							})
						})
						.collect::<Result<_, Error>>()?,
					name,
					aliases: aliases(),
					is_error: matches!(t, raw::Type::Error),
				})
			}
			raw::SchemaNode::Type(t @ raw::Type::Enum) => SchemaType::Enum(Enum {
				name: name(t)?.0,
				symbols: field!(t symbols).clone(),
				aliases: aliases(),
				default: match &object.default {
					None => None,
					Some(serde_json::Value::String(s)) => Some(s.clone()),
					Some(_) => {
						return Err(schema_error(
							"Enum `default` must be a string naming one of the symbols",
						));
					}
				},
			}),
			raw::SchemaNode::Type(t @ raw::Type::Fixed) => SchemaType::Fixed(Fixed {
				name: name(t)?.0,
				size: *field!(t size),
				aliases: aliases(),
			}),
			raw::SchemaNode::Type(
				t @ (raw::Type::Null
				| raw::Type::Boolean
				| raw::Type::Int
				| raw::Type::Long
				| raw::Type::Float
				| raw::Type::Double
				| raw::Type::Bytes
				| raw::Type::String),
			) => primitive_type(t),
			ref inner_type @ (raw::SchemaNode::Ref(_)
			| raw::SchemaNode::Object(_)
			| raw::SchemaNode::Union(_)) => {
				// We have to allow {"type": {"type": "string"}}
				// (an object with an inner type and nothing else is a valid
				// representation). However in that case we would ignore all
				// keys that are set at our current level, so we check for
				// this. Let's just pass the namespace if overridden, that
				// seems reasonable...
				if object.fields.is_none()
					&& object.symbols.is_none()
					&& object.items.is_none()
					&& object.values.is_none()
					&& object.size.is_none()
					&& object.default.is_none()
					&& object.properties.is_empty()
				{
					self.nodes.pop().expect("We have just pushed");
					if let Some(name_key) = name_key {
						self.names.remove(&name_key);
					}
					let inner_key = self.register_node(
						inner_type,
						name_key
							.as_ref()
							.and_then(|n| n.namespace)
							.or(enclosing_namespace),
					)?;
					if let Some(ref logical_type) = object.logical_type {
						if inner_key.idx & LATE_NAME_LOOKUP_REMAP_BIT != 0 {
							return Err(schema_error(
								"A logical type cannot annotate a forward named-type reference",
							));
						}
						let inner_node = &mut self.nodes[inner_key.idx];
						if inner_node.logical_type.is_some() {
							return Err(schema_error(format_args!(
								"Immediately-nested logical types: {:?} in {:?}",
								inner_node.logical_type.as_ref().map(|l| l.as_str()),
								logical_type,
							)));
						}
						inner_node.logical_type = Some(LogicalType::from_name(
							logical_type,
							object.precision,
							object.scale,
						));
					}
					return Ok(inner_key);
				} else {
					return Err(schema_error(
						"Got unnecessarily-nested type, but local object properties are set \
							- those would be ignored",
					));
				}
			}
		};

		self.nodes[idx] = SchemaNode {
			type_,
			logical_type: object
				.logical_type
				.as_deref()
				.map(|logical_type| LogicalType::from_name(logical_type, object.precision, object.scale)),
			properties: object.properties.clone(),
		};
		Ok(SchemaKey { idx })
	}
}

fn primitive_type(type_: raw::Type) -> SchemaType {
	match type_ {
		raw::Type::Null => SchemaType::Null,
		raw::Type::Boolean => SchemaType::Boolean,
		raw::Type::Int => SchemaType::Int,
		raw::Type::Long => SchemaType::Long,
		raw::Type::Float => SchemaType::Float,
		raw::Type::Double => SchemaType::Double,
		raw::Type::Bytes => SchemaType::Bytes,
		raw::Type::String => SchemaType::String,
		complex => unreachable!("{complex:?} is not a primitive type"),
	}
}

/// An alias with no dot is qualified with the namespace of the type it
/// annotates
fn qualify_alias(alias: &str, namespace: Option<&str>) -> Name {
	if alias.contains('.') {
		Name::from_fully_qualified_name(alias)
	} else {
		match namespace {
			Some(namespace) => Name::from_fully_qualified_name(format!("{namespace}.{alias}")),
			None => Name::from_fully_qualified_name(alias),
		}
	}
}

#[derive(PartialEq, Eq, Hash, Clone, Copy)]
struct NameKey<'a> {
	namespace: Option<&'a str>,
	name: &'a str,
}
impl NameKey<'_> {
	fn name(&self) -> Name {
		match self.namespace {
			None => Name::from_fully_qualified_name(self.name),
			Some(namespace) => Name::from_fully_qualified_name(format!("{}.{}", namespace, self.name)),
		}
	}
}
impl std::fmt::Display for NameKey<'_> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self.namespace {
			None => self.name.fmt(f),
			Some(namespace) => write!(f, "{}.{}", namespace, self.name),
		}
	}
}
