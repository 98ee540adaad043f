//! rust-restconf - Rust implementation of RESTCONF (RFC 8040)
//!
//! This library exposes a schema-typed YANG data tree over HTTP, translating
//! REST-style resource identifiers into tree queries and NETCONF-style
//! (RFC 6241) error reports into HTTP responses.
//!
//! # Example
//!
//! ```no_run
//! use rust_restconf::{Datastore, RequestHandler, RestRequest, SchemaTree};
//!
//! // Load the schema tree from a manifest
//! let schema = SchemaTree::load(&["example.json"]).unwrap();
//!
//! // Create a datastore bound to the data schema root
//! let datastore = Datastore::new(schema.data.clone());
//!
//! // Create a request handler (compiles the route table)
//! let handler = RequestHandler::new(&schema, datastore).unwrap();
//!
//! // Handle incoming requests
//! let request = RestRequest::get("modules-state");
//! let response = handler.handle_data(&request);
//! ```

pub mod codec;
pub mod datastore;
mod error;
pub mod handler;
pub mod path;
pub mod response;
pub mod route;
pub mod schema;
pub mod server;

pub use codec::Format;
pub use datastore::{DataNode, Datastore};
pub use error::{ErrorRecord, ErrorTag, ErrorType, RestconfError, Result};
pub use handler::{RequestContext, RequestHandler, RestRequest, RpcHandler};
pub use path::{ResolvedPath, resolve};
pub use response::RestResponse;
pub use route::{RouteEntry, RouteKind, RouteTable};
pub use schema::{SchemaKind, SchemaNode, SchemaTree};
