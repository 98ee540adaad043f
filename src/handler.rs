//! RESTCONF request handling
//!
//! HTTP framework-agnostic request handling for RESTCONF operations.
//! This is the core of the library - plug into any HTTP server.
//!
//! Each request runs as one coordinator pass: take the datastore lock
//! (shared for GET/HEAD, exclusive for everything else), resolve the resource
//! identifier into a tree query, collect the matching nodes or the error
//! records into a per-request context, render the response, and only then
//! release the lock. Client-caused failures never escape as panics; they are
//! recovered into error records and rendered like any other response.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use axum::http::{Method, StatusCode};
use serde_json::Value;

use crate::codec::{self, Format};
use crate::datastore::{DataNode, Datastore};
use crate::error::{ErrorRecord, ErrorTag, ErrorType, Result};
use crate::path;
use crate::response::{self, Negotiated, RestResponse};
use crate::route::{RouteKind, RouteTable};
use crate::schema::{SchemaNode, SchemaTree};

/// A RESTCONF request below `/restconf`, transport-agnostic.
///
/// `path` is the percent-decoded resource identifier below the data or
/// operations root, e.g. `modules-state/module=yangtree,2020-08-18`.
#[derive(Debug, Clone)]
pub struct RestRequest {
    pub method: Method,
    pub path: String,
    pub accept: Option<String>,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl RestRequest {
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            accept: None,
            content_type: None,
            body: Vec::new(),
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: &str) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn with_accept(mut self, accept: &str) -> Self {
        self.accept = Some(accept.to_string());
        self
    }

    pub fn with_body(mut self, body: Vec<u8>, content_type: &str) -> Self {
        self.body = body;
        self.content_type = Some(content_type.to_string());
        self
    }
}

/// Per-request resolution state. Created when a request enters the datastore
/// route prefix, destroyed when the response is sent, never shared across
/// requests.
#[derive(Debug, Default)]
pub struct RequestContext {
    /// Data nodes currently matching the resolved path
    pub nodes: Vec<DataNode>,
    /// True when the final resource is a list addressed without a full key
    pub group: bool,
    /// Accumulated error records, in the order they were raised
    pub errors: Vec<ErrorRecord>,
    status: Option<StatusCode>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error. The first record fixes the response status; later
    /// records are appended to the report without changing it.
    pub fn report(
        &mut self,
        error_type: ErrorType,
        error_tag: ErrorTag,
        error_path: Option<String>,
        error_message: Option<String>,
    ) {
        self.absorb(ErrorRecord::new(
            error_type, error_tag, error_path, error_message,
        ));
    }

    /// Append an already-built record under the same first-wins status rule.
    pub fn absorb(&mut self, record: ErrorRecord) {
        if self.status.is_none() {
            self.status = Some(record.status());
        }
        self.errors.push(record);
    }

    /// The response status: the first error's status, or 200 while no error
    /// has been recorded.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }
}

/// RPC handler trait for user-defined operations
pub trait RpcHandler: Send + Sync {
    /// Handle an RPC invocation. The parsed input container is passed when
    /// the rpc declares one and the request carried a body; the returned
    /// value becomes the rpc output.
    fn handle(&self, input: Option<&Value>) -> Result<Option<Value>>;
}

/// Main RESTCONF request handler
///
/// Owns the datastore behind a single reader/writer lock and the route table
/// compiled at startup.
///
/// # Example
/// ```ignore
/// let handler = RequestHandler::new(schema, datastore)?;
/// let response = handler.handle_data(&RestRequest::get("modules-state"));
/// // Send response via your HTTP transport
/// ```
pub struct RequestHandler {
    datastore: RwLock<Datastore>,
    routes: RouteTable,
    rpcs: HashMap<String, Box<dyn RpcHandler>>,
}

impl RequestHandler {
    /// Create a handler, compiling the route table. A schema tree with
    /// malformed routing metadata is a startup error; serve nothing rather
    /// than a partial table.
    pub fn new(schema: &SchemaTree, datastore: Datastore) -> Result<Self> {
        let routes = RouteTable::compile(schema)?;
        Ok(Self {
            datastore: RwLock::new(datastore),
            routes,
            rpcs: HashMap::new(),
        })
    }

    /// Register a user-defined rpc implementation by operation name.
    pub fn register_rpc(&mut self, name: &str, rpc: Box<dyn RpcHandler>) {
        self.rpcs.insert(name.to_string(), rpc);
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Replace the data tree from a startup payload.
    pub fn load_startup(&self, bytes: &[u8], format: Format) -> Result<()> {
        let data = codec::unmarshal(bytes, format)?;
        let mut guard = self
            .datastore
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        guard.replace(data);
        Ok(())
    }

    /// Handle a request addressing `/restconf/data`.
    ///
    /// The lock is held from before resolution until the response bytes are
    /// rendered, so a request never serves a torn view of the tree.
    pub fn handle_data(&self, request: &RestRequest) -> RestResponse {
        if is_read_only(&request.method) {
            let ds = self.datastore.read().unwrap_or_else(PoisonError::into_inner);
            self.data_request(&ds, request)
        } else {
            let ds = self
                .datastore
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            self.data_request(&ds, request)
        }
    }

    /// Handle a request addressing `/restconf/operations`.
    pub fn handle_operation(&self, request: &RestRequest) -> RestResponse {
        if is_read_only(&request.method) {
            let ds = self.datastore.read().unwrap_or_else(PoisonError::into_inner);
            self.operation_request(&ds, request)
        } else {
            let ds = self
                .datastore
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            self.operation_request(&ds, request)
        }
    }

    fn data_request(&self, ds: &Datastore, request: &RestRequest) -> RestResponse {
        let mut ctx = RequestContext::new();
        // Resolution runs for every method so that a bogus path reports
        // data-missing rather than method-not-allowed.
        self.resolve_data(ds, &request.path, &mut ctx);
        if !is_read_only(&request.method) {
            ctx.report(
                ErrorType::Protocol,
                ErrorTag::OperationNotSupported,
                None,
                Some(format!("HTTP {} not implemented yet", request.method)),
            );
        }
        self.respond(ctx, ds, request)
    }

    /// Resolve the resource identifier, classify the target through the
    /// route table, and run the tree lookup.
    fn resolve_data(&self, ds: &Datastore, rpath: &str, ctx: &mut RequestContext) {
        let resolved = match path::resolve(ds.schema(), rpath) {
            Ok(resolved) => resolved,
            Err(err) => {
                ctx.report(
                    ErrorType::Application,
                    ErrorTag::UnknownElement,
                    Some(format!("/{}", rpath)),
                    Some(err.to_string()),
                );
                return;
            }
        };

        if let Some(target) = resolved.target() {
            match self.routes.entry_for(target).map(|e| e.kind) {
                Some(RouteKind::List) => ctx.group = resolved.is_collection(),
                Some(RouteKind::Container | RouteKind::Leaf) => {}
                Some(RouteKind::Rpc) | None => {
                    ctx.report(
                        ErrorType::Application,
                        ErrorTag::UnknownElement,
                        Some(format!("/{}", rpath)),
                        Some("unable to identify the requested resource".into()),
                    );
                    return;
                }
            }
        }

        let query = resolved.query();
        match ds.find(&query) {
            Ok(nodes) if nodes.is_empty() => ctx.report(
                ErrorType::Application,
                ErrorTag::DataMissing,
                Some(format!("/{}", query)),
                None,
            ),
            Ok(nodes) => ctx.nodes = nodes,
            Err(err) => ctx.report(
                ErrorType::Application,
                ErrorTag::OperationFailed,
                Some(format!("/{}", query)),
                Some(err.to_string()),
            ),
        }
    }

    fn operation_request(&self, ds: &Datastore, request: &RestRequest) -> RestResponse {
        let mut ctx = RequestContext::new();
        let name = request.path.trim_matches('/');
        match self.routes.find_operation(name) {
            None => ctx.report(
                ErrorType::Application,
                ErrorTag::UnknownElement,
                Some(format!("/{}", name)),
                Some("unable to identify the requested operation".into()),
            ),
            Some(entry) => {
                if request.method == Method::POST {
                    let schema = Arc::clone(&entry.schema);
                    self.invoke_rpc(&schema, request, &mut ctx);
                } else {
                    ctx.report(
                        ErrorType::Protocol,
                        ErrorTag::OperationNotSupported,
                        None,
                        Some(format!(
                            "use HTTP POST instead of {} for restconf rpc",
                            request.method
                        )),
                    );
                }
            }
        }

        if ctx.errors.is_empty() && ctx.nodes.is_empty() {
            // Successful rpc with no declared output. An unusable Accept
            // header still falls through to the error renderer.
            if response::negotiate(request.accept.as_deref()).is_ok() {
                return RestResponse::no_content();
            }
        }
        self.respond(ctx, ds, request)
    }

    /// Parse the request body against the rpc input schema and dispatch to
    /// the registered implementation, if any.
    fn invoke_rpc(
        &self,
        schema: &Arc<SchemaNode>,
        request: &RestRequest,
        ctx: &mut RequestContext,
    ) {
        let mut input: Option<Value> = None;
        if let Some(input_schema) = &schema.input {
            if !request.body.is_empty() {
                let Some(format) = request
                    .content_type
                    .as_deref()
                    .and_then(Format::from_media_type)
                else {
                    ctx.report(
                        ErrorType::Transport,
                        ErrorTag::InvalidValue,
                        None,
                        Some("not supported Content-Type".into()),
                    );
                    return;
                };
                let body = match codec::unmarshal(&request.body, format) {
                    Ok(value) => value,
                    Err(err) => {
                        ctx.report(
                            ErrorType::Application,
                            ErrorTag::MalformedMessage,
                            None,
                            Some(format!("parsing rpc failed: {}", err)),
                        );
                        return;
                    }
                };
                let parsed = extract_rpc_input(&body);
                if let Err(bad) = validate_against(input_schema, &parsed) {
                    ctx.report(
                        ErrorType::Application,
                        ErrorTag::MalformedMessage,
                        None,
                        Some(format!("parsing rpc failed: {}", bad)),
                    );
                    return;
                }
                input = Some(parsed);
            }
        }

        match self.rpcs.get(&schema.name) {
            Some(rpc) => match rpc.handle(input.as_ref()) {
                Ok(Some(output)) if schema.output.is_some() => {
                    let output_schema = schema.output.as_ref().map(Arc::clone);
                    ctx.nodes = vec![DataNode {
                        id: "output".into(),
                        name: "output".into(),
                        schema: output_schema.unwrap_or_else(|| Arc::clone(schema)),
                        value: output,
                    }];
                }
                // Output without a declared schema is dropped; the rpc still
                // succeeded.
                Ok(_) => {}
                Err(err) => ctx.report(
                    ErrorType::Application,
                    ErrorTag::OperationFailed,
                    None,
                    Some(err.to_string()),
                ),
            },
            // No registered implementation: the input parsed, acknowledge.
            None => {}
        }
    }

    /// Negotiate the representation and render the context, success or error.
    fn respond(&self, mut ctx: RequestContext, ds: &Datastore, request: &RestRequest) -> RestResponse {
        let negotiated = match response::negotiate(request.accept.as_deref()) {
            Ok(negotiated) => negotiated,
            Err(record) => {
                ctx.absorb(record);
                Negotiated::default_xml()
            }
        };

        let mut resp = if ctx.errors.is_empty() {
            match response::respond_nodes(ds, &ctx.nodes, ctx.group, &negotiated) {
                Ok(resp) => resp,
                Err(record) => {
                    ctx.absorb(record);
                    response::respond_errors(&ctx.errors, ctx.status(), &negotiated)
                }
            }
        } else {
            response::respond_errors(&ctx.errors, ctx.status(), &negotiated)
        };

        if request.method == Method::HEAD {
            resp.body.clear();
        }
        resp
    }
}

fn is_read_only(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD
}

/// Accept both the wrapped `{"input": {...}}` body and bare input members.
fn extract_rpc_input(body: &Value) -> Value {
    match body.get("input") {
        Some(inner) => inner.clone(),
        None => body.clone(),
    }
}

/// Check a parsed input container against the declared input schema: every
/// member must be a declared child.
fn validate_against(schema: &Arc<SchemaNode>, value: &Value) -> std::result::Result<(), String> {
    let Some(members) = value.as_object() else {
        return Err(format!("{} input is not a container", schema.name));
    };
    for (name, sub) in members {
        match schema.child(name) {
            Some(child) if child.is_dir() => validate_against(child, sub)?,
            Some(_) => {}
            None => return Err(format!("unknown input node {}", name)),
        }
    }
    Ok(())
}
