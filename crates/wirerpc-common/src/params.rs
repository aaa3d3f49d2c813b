//! Transport metadata injection into decoded params.
//!
//! The dispatch engine runs an optional hook on every decoded params value
//! before the handler sees it (the HTTP adapter uses this to hand the
//! request headers to interested methods). Because handler input types are
//! erased by the time the hook runs, the hook operates through the
//! [`ParamsMeta`] trait object; a type opts into header injection by
//! exposing a slot, which `rpc_object!` wires up via its `headers:` marker.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};

use http::HeaderMap;
use serde_json::Value;

use crate::schema::{Describe, Schema, Walker};

/// HTTP request headers as carried inside a params struct.
///
/// The field is populated by the server after decoding; mark it
/// `#[serde(skip)]` so it never appears on the wire.
#[derive(Debug, Clone, Default)]
pub struct Headers(pub HeaderMap);

impl Headers {
    /// Convenience accessor returning a header value as text.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(|v| v.to_str().ok())
    }
}

// Headers are transport metadata, not part of the declared shape; tag the
// field `widget:"hidden"` to keep it out of the served schema.
impl Describe for Headers {
    fn type_name() -> std::borrow::Cow<'static, str> {
        std::borrow::Cow::Borrowed("Headers")
    }

    fn describe(_walker: &mut Walker<'_>) -> Schema {
        Schema::default()
    }
}

/// Decoded params as seen by a dispatch hook.
pub trait ParamsMeta: Any + Send {
    /// Mutable slot for injected HTTP headers, when the type declares one.
    fn header_slot(&mut self) -> Option<&mut Headers> {
        None
    }
}

macro_rules! params_meta_leaf {
    ($($ty:ty),+ $(,)?) => {$(
        impl ParamsMeta for $ty {}
    )+};
}

params_meta_leaf!(
    i8, i16, i32, i64, u8, u16, u32, u64, isize, usize, f32, f64, bool, String, Value, Headers
);

impl<T: Send + 'static> ParamsMeta for Vec<T> {}
impl<T: Send + 'static> ParamsMeta for Option<T> {}
impl<T: Send + 'static> ParamsMeta for Box<T> {}
impl<K: Send + 'static, V: Send + 'static> ParamsMeta for HashMap<K, V> {}
impl<K: Send + 'static, V: Send + 'static> ParamsMeta for BTreeMap<K, V> {}
