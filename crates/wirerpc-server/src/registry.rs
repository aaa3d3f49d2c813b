//! Method registry.
//!
//! The [`Server`] maps method names to type-erased handler adapters and
//! maintains the OpenRPC document incrementally as methods are registered.
//! Registrations live for the life of the server; re-registering a name
//! replaces both the handler and its schema entry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::watch;

use wirerpc_common::protocol::{Result, RpcError};
use wirerpc_common::schema::{MethodSchema, SchemaInfo, SchemaRoot, SchemaServer};

use crate::method::{Adapter, RpcMethod};

/// Origin predicate for CORS, consulted when the allow-list has no exact
/// match.
pub type OriginPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

pub(crate) struct MethodHandler {
    pub(crate) adapter: Adapter,
    pub(crate) schema: MethodSchema,
}

pub(crate) struct ServerInner {
    pub(crate) methods: RwLock<HashMap<String, Arc<MethodHandler>>>,
    pub(crate) schema_root: RwLock<SchemaRoot>,
    pub(crate) allow_origins: RwLock<Vec<String>>,
    pub(crate) allow_origins_fn: RwLock<Option<OriginPredicate>>,
    pub(crate) tcp_shutdown: Mutex<Option<watch::Sender<bool>>>,
    pub(crate) tcp_addr: Mutex<Option<std::net::SocketAddr>>,
    pub(crate) http_addr: Mutex<Option<std::net::SocketAddr>>,
}

/// The RPC server: method registry, dispatch engine and transport listeners.
///
/// Cloning is cheap and every clone shares the same registry, so a server
/// may expose both transports at once:
///
/// ```no_run
/// use wirerpc_server::Server;
///
/// # async fn run() -> wirerpc_common::protocol::Result<()> {
/// let server = Server::new();
/// server.set("ping", || async { "pong".to_string() });
///
/// let tcp = server.clone();
/// tokio::spawn(async move { tcp.listen_tcp("0.0.0.0:8001").await });
/// server.listen_http("0.0.0.0:8080").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Server {
    pub(crate) inner: Arc<ServerInner>,
}

impl Server {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ServerInner {
                methods: RwLock::new(HashMap::new()),
                schema_root: RwLock::new(SchemaRoot::new()),
                allow_origins: RwLock::new(Vec::new()),
                allow_origins_fn: RwLock::new(None),
                tcp_shutdown: Mutex::new(None),
                tcp_addr: Mutex::new(None),
                http_addr: Mutex::new(None),
            }),
        }
    }

    /// Register `method` under `name`, deriving its schema entry from the
    /// handler signature.
    pub fn set<Marker>(&self, name: impl Into<String>, method: impl RpcMethod<Marker>) {
        self.set_entry(name.into(), method, MethodSchema::default());
    }

    /// Register `method` with a schema override. The override contributes
    /// its descriptive parts (e.g. `summary`); name, params and result are
    /// still derived from the signature.
    pub fn set_with_schema<Marker>(
        &self,
        name: impl Into<String>,
        method: impl RpcMethod<Marker>,
        schema: MethodSchema,
    ) {
        self.set_entry(name.into(), method, schema);
    }

    fn set_entry<Marker, H: RpcMethod<Marker>>(&self, name: String, method: H, base: MethodSchema) {
        let schema = {
            let mut root = self.inner.schema_root.write().unwrap();
            let schema = H::method_schema(&name, base, &mut root.defs);
            match root.methods.iter_mut().find(|m| m.name == name) {
                Some(entry) => *entry = schema.clone(),
                None => root.methods.push(schema.clone()),
            }
            schema
        };
        let handler = Arc::new(MethodHandler {
            adapter: method.into_adapter(),
            schema,
        });
        self.inner.methods.write().unwrap().insert(name, handler);
    }

    pub(crate) fn get(&self, name: &str) -> Result<Arc<MethodHandler>> {
        self.inner
            .methods
            .read()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or(RpcError::MethodNotFound)
    }

    /// Names of all registered methods.
    pub fn methods(&self) -> Vec<String> {
        self.inner.methods.read().unwrap().keys().cloned().collect()
    }

    /// Schema entry of one registered method.
    pub fn method_schema(&self, name: &str) -> Result<MethodSchema> {
        Ok(self.get(name)?.schema.clone())
    }

    /// Snapshot of the full OpenRPC document.
    pub fn schema_root(&self) -> SchemaRoot {
        self.inner.schema_root.read().unwrap().clone()
    }

    /// Replace the `info` block of the served schema document.
    pub fn set_schema_info(&self, info: SchemaInfo) {
        self.inner.schema_root.write().unwrap().info = info;
    }

    /// Replace the `servers` list of the served schema document.
    pub fn set_schema_servers(&self, servers: Vec<SchemaServer>) {
        self.inner.schema_root.write().unwrap().servers = servers;
    }

    /// Address the TCP listener is bound to, once `listen_tcp` is up.
    pub fn tcp_addr(&self) -> Option<std::net::SocketAddr> {
        *self.inner.tcp_addr.lock().unwrap()
    }

    /// Address the HTTP listener is bound to, once `listen_http` is up.
    pub fn http_addr(&self) -> Option<std::net::SocketAddr> {
        *self.inner.http_addr.lock().unwrap()
    }

    /// Origins allowed by the CORS layer, matched exactly.
    pub fn set_allow_origins(&self, origins: Vec<String>) {
        *self.inner.allow_origins.write().unwrap() = origins;
    }

    /// Origin predicate consulted when the allow-list has no match.
    pub fn set_allow_origins_fn(&self, f: impl Fn(&str) -> bool + Send + Sync + 'static) {
        *self.inner.allow_origins_fn.write().unwrap() = Some(Arc::new(f));
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use wirerpc_common::rpc_object;

    rpc_object! {
        #[derive(Debug, Clone, Default, Serialize, Deserialize)]
        pub struct EchoParams {
            pub t: i64,
        }
    }

    async fn echo(params: EchoParams) -> EchoParams {
        params
    }

    #[test]
    fn test_set_and_get() {
        let server = Server::new();
        server.set("echo", echo);

        assert!(server.get("echo").is_ok());
        assert!(matches!(
            server.get("missing"),
            Err(RpcError::MethodNotFound)
        ));
        assert_eq!(server.methods(), vec!["echo".to_string()]);
    }

    #[test]
    fn test_derived_method_schema() {
        let server = Server::new();
        server.set("echo", echo);

        let schema = server.method_schema("echo").unwrap();
        assert_eq!(schema.name, "echo");
        assert_eq!(schema.params.len(), 1);
        assert_eq!(schema.params[0].name, "Params");
        assert!(schema.params[0].required);
        assert_eq!(schema.params[0].schema.as_ref().unwrap().id, "EchoParams");
        assert_eq!(schema.result.name, "result");

        let root = server.schema_root();
        assert!(root.defs.contains_key("EchoParams"));
        assert_eq!(root.openrpc, "1.2.6");
    }

    #[test]
    fn test_nullary_method_schema() {
        let server = Server::new();
        server.set("now", || async { 0i64 });

        let schema = server.method_schema("now").unwrap();
        assert!(schema.params.is_empty());
        assert_eq!(schema.result.schema.as_ref().unwrap().type_name, "i64");
    }

    #[test]
    fn test_reregistration_replaces_schema_entry() {
        let server = Server::new();
        server.set("m", || async { 1i64 });
        server.set("m", || async { "two".to_string() });

        let root = server.schema_root();
        assert_eq!(root.methods.len(), 1);
        assert_eq!(
            root.methods[0].result.schema.as_ref().unwrap().kind,
            "string"
        );
    }

    #[test]
    fn test_schema_override_keeps_summary() {
        let server = Server::new();
        server.set_with_schema(
            "m",
            || async { 1i64 },
            MethodSchema {
                summary: "adds numbers".to_string(),
                ..Default::default()
            },
        );

        let schema = server.method_schema("m").unwrap();
        assert_eq!(schema.summary, "adds numbers");
        assert_eq!(schema.name, "m");
    }
}
