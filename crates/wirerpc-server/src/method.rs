//! Handler adapters.
//!
//! Methods register as ordinary async functions taking zero or one parameter
//! and returning nothing, a value, or a `Result`. The [`RpcMethod`] trait
//! erases those shapes into a single adapter signature the dispatch engine
//! works with: `adapter(raw params) -> (result, optional error)`. Marker
//! types disambiguate the signature variants the way runtime reflection
//! would elsewhere; the compiler picks the applicable one during `set`.

use std::collections::BTreeMap;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::value::RawValue;
use serde_json::Value;

use wirerpc_common::params::ParamsMeta;
use wirerpc_common::protocol::CallError;
use wirerpc_common::schema::{Describe, MethodSchema, MethodSchemaParam, Schema};

/// Hook run on the decoded params value before the handler is invoked.
///
/// The HTTP listener installs one per request to inject the request headers;
/// embedders may install their own when calling
/// [`Server::handle_bytes`](crate::Server::handle_bytes) directly.
pub type ParamsHook = Arc<dyn Fn(&mut dyn ParamsMeta) + Send + Sync>;

/// Future returned by an adapter invocation.
pub type AdapterFuture = Pin<Box<dyn Future<Output = Result<Option<Value>, CallError>> + Send>>;

/// Type-erased method handler: raw params in, result or error out.
pub type Adapter =
    Arc<dyn Fn(Option<Box<RawValue>>, Option<ParamsHook>) -> AdapterFuture + Send + Sync>;

/// Normalizes the return value variants a handler may have.
///
/// Covered shapes: `()`, a serializable value, `Result<T, E>` and
/// `Result<(), E>` for any `E` convertible into [`CallError`].
pub trait Returns<Marker>: Send {
    fn into_outcome(self) -> Result<Option<Value>, CallError>;

    /// Schema of the (successful) result, if the shape produces one.
    fn result_schema(defs: &mut BTreeMap<String, Schema>) -> Option<Schema>;
}

pub enum UnitReturn {}
pub enum ValueReturn {}
pub enum FallibleReturn {}
pub enum FallibleUnitReturn {}

impl Returns<UnitReturn> for () {
    fn into_outcome(self) -> Result<Option<Value>, CallError> {
        Ok(None)
    }

    fn result_schema(_defs: &mut BTreeMap<String, Schema>) -> Option<Schema> {
        None
    }
}

impl<T> Returns<ValueReturn> for T
where
    T: Serialize + Describe + Send,
{
    fn into_outcome(self) -> Result<Option<Value>, CallError> {
        Ok(Some(serde_json::to_value(self)?))
    }

    fn result_schema(defs: &mut BTreeMap<String, Schema>) -> Option<Schema> {
        Some(Schema::of_with_defs::<T>(defs))
    }
}

impl<T, E> Returns<FallibleReturn> for Result<T, E>
where
    T: Serialize + Describe + Send,
    E: Into<CallError> + Send,
{
    fn into_outcome(self) -> Result<Option<Value>, CallError> {
        match self {
            Ok(value) => Ok(Some(serde_json::to_value(value)?)),
            Err(err) => Err(err.into()),
        }
    }

    fn result_schema(defs: &mut BTreeMap<String, Schema>) -> Option<Schema> {
        Some(Schema::of_with_defs::<T>(defs))
    }
}

impl<E> Returns<FallibleUnitReturn> for Result<(), E>
where
    E: Into<CallError> + Send,
{
    fn into_outcome(self) -> Result<Option<Value>, CallError> {
        match self {
            Ok(()) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn result_schema(_defs: &mut BTreeMap<String, Schema>) -> Option<Schema> {
        None
    }
}

/// Marker for handlers taking no parameters.
pub struct Nullary;

/// Marker for handlers taking one decoded parameter of type `In`.
pub struct Unary<In>(PhantomData<In>);

/// A registrable method handler.
///
/// `Marker` carries the signature variant; callers never name it, inference
/// resolves it from the function passed to [`Server::set`](crate::Server::set).
pub trait RpcMethod<Marker>: Send + Sync + Sized + 'static {
    /// Build the method's schema entry, deriving the params and result
    /// descriptors from the handler signature. `base` contributes the
    /// caller-supplied parts of an override (e.g. `summary`); name, params
    /// and result are always derived.
    fn method_schema(
        name: &str,
        base: MethodSchema,
        defs: &mut BTreeMap<String, Schema>,
    ) -> MethodSchema;

    fn into_adapter(self) -> Adapter;
}

impl<F, Fut, R, RM> RpcMethod<(Nullary, RM)> for F
where
    F: Fn() -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Returns<RM> + 'static,
    RM: 'static,
{
    fn method_schema(
        name: &str,
        base: MethodSchema,
        defs: &mut BTreeMap<String, Schema>,
    ) -> MethodSchema {
        MethodSchema {
            name: name.to_string(),
            params: Vec::new(),
            result: MethodSchemaParam {
                name: "result".to_string(),
                required: false,
                schema: R::result_schema(defs),
            },
            ..base
        }
    }

    fn into_adapter(self) -> Adapter {
        Arc::new(move |_params, _hook| {
            let call = self.clone();
            Box::pin(async move { call().await.into_outcome() })
        })
    }
}

impl<F, Fut, In, R, RM> RpcMethod<(Unary<In>, RM)> for F
where
    F: Fn(In) -> Fut + Send + Sync + Clone + 'static,
    In: DeserializeOwned + Default + Describe + ParamsMeta + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Returns<RM> + 'static,
    RM: 'static,
{
    fn method_schema(
        name: &str,
        base: MethodSchema,
        defs: &mut BTreeMap<String, Schema>,
    ) -> MethodSchema {
        MethodSchema {
            name: name.to_string(),
            params: vec![MethodSchemaParam {
                name: "Params".to_string(),
                required: true,
                schema: Some(Schema::of_with_defs::<In>(defs)),
            }],
            result: MethodSchemaParam {
                name: "result".to_string(),
                required: false,
                schema: R::result_schema(defs),
            },
            ..base
        }
    }

    fn into_adapter(self) -> Adapter {
        Arc::new(move |params, hook| {
            let call = self.clone();
            Box::pin(async move {
                // absent params decode to the type's zero value
                let mut input = match params {
                    Some(raw) => serde_json::from_str::<In>(raw.get())?,
                    None => In::default(),
                };
                if let Some(hook) = hook {
                    hook(&mut input);
                }
                call(input).await.into_outcome()
            })
        })
    }
}
