//! Schema derivation and the OpenRPC document model.
//!
//! Method parameter and result types describe themselves through the
//! [`Describe`] trait: primitives map to `"number"` / `"boolean"` /
//! `"string"`, collections to `"array"` and `"map"`, and structs to
//! `"object"` nodes with per-field descriptors. Struct implementations come
//! from the [`rpc_object!`](crate::rpc_object) macro, which also carries the
//! field tags (`label`, `validate`, `widget`, ...) that a plain type cannot.
//!
//! Derivation terminates on any finite or recursive type graph: the
//! [`Walker`] tracks the types on the current traversal stack, and a
//! reentered struct becomes a `{"$id": typeName}` reference node when a
//! `$defs` pool is active, or an empty terminal node otherwise. With a pool,
//! finished struct nodes are interned under their type name and replaced by
//! references everywhere they appear.

pub mod tags;

pub use tags::Tags;

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const TYPE_STRING: &str = "string";
pub const TYPE_NUMBER: &str = "number";
pub const TYPE_BOOLEAN: &str = "boolean";
pub const TYPE_OBJECT: &str = "object";
pub const TYPE_ARRAY: &str = "array";
pub const TYPE_MAP: &str = "map";

/// One node of a derived type descriptor tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Schema {
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(rename = "typeName", default, skip_serializing_if = "String::is_empty")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, Schema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub weight: i64,
    #[serde(
        rename = "widgetSettings",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub widget_settings: BTreeMap<String, Value>,
    #[serde(rename = "$id", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "$defs", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub defs: BTreeMap<String, Schema>,
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

impl Schema {
    /// Reference node pointing into a `$defs` pool.
    pub fn reference(type_name: &str) -> Self {
        Schema {
            id: type_name.to_string(),
            ..Default::default()
        }
    }

    /// Derive the descriptor of `T` with struct nodes inlined.
    pub fn of<T: Describe>() -> Self {
        T::describe(&mut Walker::new())
    }

    /// Derive the descriptor of `T`, interning struct nodes into `defs` and
    /// leaving `{"$id": typeName}` references in their place.
    pub fn of_with_defs<T: Describe>(defs: &mut BTreeMap<String, Schema>) -> Self {
        T::describe(&mut Walker::with_defs(defs))
    }

    /// Derive a self-contained descriptor of `T` carrying its own `$defs`
    /// pool on the root node.
    pub fn of_interned<T: Describe>() -> Self {
        let mut defs = BTreeMap::new();
        let mut schema = Self::of_with_defs::<T>(&mut defs);
        schema.defs = defs;
        schema
    }
}

/// Descriptor function of a single struct field, as recorded by
/// `rpc_object!`: declared name, raw tag string, and the field type's
/// [`Describe::describe`].
pub type FieldDef = (
    &'static str,
    &'static str,
    fn(&mut Walker<'_>) -> Schema,
);

/// Traversal state of one derivation: the stack of struct types currently
/// being expanded plus the optional interning pool.
pub struct Walker<'d> {
    stack: Vec<String>,
    defs: Option<&'d mut BTreeMap<String, Schema>>,
}

impl Walker<'static> {
    pub fn new() -> Self {
        Walker {
            stack: Vec::new(),
            defs: None,
        }
    }
}

impl Default for Walker<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'d> Walker<'d> {
    pub fn with_defs(defs: &'d mut BTreeMap<String, Schema>) -> Self {
        Walker {
            stack: Vec::new(),
            defs: Some(defs),
        }
    }

    /// Expand a struct type into an `"object"` node.
    ///
    /// Reentering a type already on the traversal stack yields a reference
    /// node (with a pool) or an empty terminal node (without), so recursive
    /// types always derive to a finite tree.
    pub fn object(&mut self, type_name: &str, fields: &[FieldDef]) -> Schema {
        if self.stack.iter().any(|entered| entered == type_name) {
            return match self.defs {
                Some(_) => Schema::reference(type_name),
                None => Schema::default(),
            };
        }
        self.stack.push(type_name.to_string());

        let mut properties = BTreeMap::new();
        for (declared, raw_tags, describe) in fields {
            let tags = Tags::parse(raw_tags);
            if tags.hidden() {
                continue;
            }
            let Some(name) = tags.field_name(declared) else {
                continue;
            };
            let mut field_schema = describe(self);
            tags.apply(&mut field_schema);
            properties.insert(name.to_string(), field_schema);
        }

        self.stack.pop();

        let node = Schema {
            kind: TYPE_OBJECT.to_string(),
            type_name: type_name.to_string(),
            properties: Some(properties),
            ..Default::default()
        };
        match self.defs.as_deref_mut() {
            Some(defs) => {
                defs.insert(type_name.to_string(), node);
                Schema::reference(type_name)
            }
            None => node,
        }
    }
}

/// Types that can derive their own schema descriptor.
pub trait Describe {
    /// Language-native type name, recorded in `typeName` and used as the
    /// `$defs` key for struct types.
    fn type_name() -> Cow<'static, str>;

    fn describe(walker: &mut Walker<'_>) -> Schema;
}

macro_rules! describe_primitive {
    ($kind:expr => $($ty:ty),+ $(,)?) => {$(
        impl Describe for $ty {
            fn type_name() -> Cow<'static, str> {
                Cow::Borrowed(stringify!($ty))
            }

            fn describe(_walker: &mut Walker<'_>) -> Schema {
                Schema {
                    kind: $kind.to_string(),
                    type_name: stringify!($ty).to_string(),
                    ..Default::default()
                }
            }
        }
    )+};
}

describe_primitive!(TYPE_NUMBER => i8, i16, i32, i64, u8, u16, u32, u64, isize, usize, f32, f64);
describe_primitive!(TYPE_BOOLEAN => bool);

impl Describe for String {
    fn type_name() -> Cow<'static, str> {
        Cow::Borrowed("String")
    }

    fn describe(_walker: &mut Walker<'_>) -> Schema {
        Schema {
            kind: TYPE_STRING.to_string(),
            type_name: "String".to_string(),
            ..Default::default()
        }
    }
}

// Arbitrary JSON has no shape to describe.
impl Describe for Value {
    fn type_name() -> Cow<'static, str> {
        Cow::Borrowed("Value")
    }

    fn describe(_walker: &mut Walker<'_>) -> Schema {
        Schema::default()
    }
}

impl<T: Describe> Describe for Vec<T> {
    fn type_name() -> Cow<'static, str> {
        Cow::Owned(format!("Vec<{}>", T::type_name()))
    }

    fn describe(walker: &mut Walker<'_>) -> Schema {
        Schema {
            kind: TYPE_ARRAY.to_string(),
            type_name: Self::type_name().into_owned(),
            items: Some(Box::new(T::describe(walker))),
            ..Default::default()
        }
    }
}

impl<V: Describe> Describe for std::collections::HashMap<String, V> {
    fn type_name() -> Cow<'static, str> {
        Cow::Owned(format!("HashMap<String, {}>", V::type_name()))
    }

    fn describe(walker: &mut Walker<'_>) -> Schema {
        Schema {
            kind: TYPE_MAP.to_string(),
            type_name: Self::type_name().into_owned(),
            items: Some(Box::new(V::describe(walker))),
            ..Default::default()
        }
    }
}

impl<V: Describe> Describe for BTreeMap<String, V> {
    fn type_name() -> Cow<'static, str> {
        Cow::Owned(format!("BTreeMap<String, {}>", V::type_name()))
    }

    fn describe(walker: &mut Walker<'_>) -> Schema {
        Schema {
            kind: TYPE_MAP.to_string(),
            type_name: Self::type_name().into_owned(),
            items: Some(Box::new(V::describe(walker))),
            ..Default::default()
        }
    }
}

// An optional value describes as its inner type, like a nullable pointer.
impl<T: Describe> Describe for Option<T> {
    fn type_name() -> Cow<'static, str> {
        T::type_name()
    }

    fn describe(walker: &mut Walker<'_>) -> Schema {
        T::describe(walker)
    }
}

impl<T: Describe> Describe for Box<T> {
    fn type_name() -> Cow<'static, str> {
        T::type_name()
    }

    fn describe(walker: &mut Walker<'_>) -> Schema {
        T::describe(walker)
    }
}

/// Root of the served schema document (OpenRPC flavored).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaRoot {
    pub openrpc: String,
    pub info: SchemaInfo,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<SchemaServer>,
    pub methods: Vec<MethodSchema>,
    #[serde(rename = "$defs", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub defs: BTreeMap<String, Schema>,
}

impl SchemaRoot {
    pub fn new() -> Self {
        Self {
            openrpc: "1.2.6".to_string(),
            info: SchemaInfo {
                title: String::new(),
                version: "1.0.0".to_string(),
                description: None,
                license: None,
            },
            servers: Vec::new(),
            methods: Vec::new(),
            defs: BTreeMap::new(),
        }
    }
}

impl Default for SchemaRoot {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaInfo {
    pub title: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<SchemaLicense>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaLicense {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaServer {
    pub name: String,
    pub url: String,
}

/// Self-description of one registered method.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MethodSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    pub params: Vec<MethodSchemaParam>,
    pub result: MethodSchemaParam,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MethodSchemaParam {
    pub name: String,
    pub required: bool,
    pub schema: Option<Schema>,
}
