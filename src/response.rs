//! Response negotiation and rendering
//!
//! The negotiator picks the serialization format from the request's `Accept`
//! header against a fixed preference list, then renders either the resolved
//! node set or the accumulated error container. Group synthesis happens here:
//! a collection request (or a multi-parent match) is merged into one node
//! before marshaling, never serialized as N separate top-level nodes.

use axum::http::StatusCode;

use crate::codec::{self, Format};
use crate::datastore::{DataNode, Datastore};
use crate::error::{ErrorRecord, ErrorTag, ErrorType, errors_container};

/// Default representation when the client allows anything.
pub const DEFAULT_MEDIA_TYPE: &str = "application/yang-data+xml";

/// A rendered RESTCONF response, transport-agnostic.
#[derive(Debug, Clone)]
pub struct RestResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl RestResponse {
    /// The terminal success for an rpc with no declared output.
    pub fn no_content() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            content_type: None,
            body: Vec::new(),
        }
    }
}

/// Outcome of `Accept` negotiation.
#[derive(Debug, Clone)]
pub struct Negotiated {
    pub format: Format,
    pub content_type: String,
}

impl Negotiated {
    /// XML with the vendor media type, used for `*/*` and for rendering the
    /// not-acceptable error itself.
    pub fn default_xml() -> Self {
        Self {
            format: Format::Xml,
            content_type: DEFAULT_MEDIA_TYPE.to_string(),
        }
    }
}

/// Pick the response format from an `Accept` header.
///
/// A missing header, an empty header, or a wildcard entry selects the XML
/// default with the vendor media type. An explicit recognized media type is
/// echoed back as `Content-Type`. A header naming only unsupported types is
/// a transport-layer `invalid-value` error.
pub fn negotiate(accept: Option<&str>) -> Result<Negotiated, ErrorRecord> {
    let Some(header) = accept else {
        return Ok(Negotiated::default_xml());
    };
    let mut explicit = false;
    for item in header.split(',') {
        let essence = item.split(';').next().unwrap_or_default().trim();
        if essence.is_empty() {
            continue;
        }
        if essence == "*/*" {
            return Ok(Negotiated::default_xml());
        }
        explicit = true;
        if let Some(format) = Format::from_media_type(essence) {
            return Ok(Negotiated {
                format,
                content_type: essence.to_string(),
            });
        }
    }
    if !explicit {
        return Ok(Negotiated::default_xml());
    }
    Err(ErrorRecord::new(
        ErrorType::Transport,
        ErrorTag::InvalidValue,
        None,
        Some(format!("not supported Accept: {}", header)),
    ))
}

/// Render a success node set. Grouping is requested from the datastore when
/// the result is a collection or spans multiple parents; a grouping failure
/// is an internal `operation-failed` error, not a partial serialization.
pub fn respond_nodes(
    ds: &Datastore,
    nodes: &[DataNode],
    group: bool,
    negotiated: &Negotiated,
) -> Result<RestResponse, ErrorRecord> {
    let Some(first) = nodes.first() else {
        // An empty result set must have been reported as an error upstream.
        return Err(ErrorRecord::new(
            ErrorType::Application,
            ErrorTag::OperationFailed,
            None,
            Some("empty result set reached the response negotiator".into()),
        ));
    };
    let grouped;
    let node = if group || nodes.len() > 1 {
        grouped = ds.group(&first.schema, nodes).map_err(|err| {
            ErrorRecord::new(
                ErrorType::Application,
                ErrorTag::OperationFailed,
                None,
                Some(err.to_string()),
            )
        })?;
        &grouped
    } else {
        first
    };
    match codec::marshal(&node.name, &node.value, negotiated.format) {
        Ok(body) => Ok(RestResponse {
            status: StatusCode::OK,
            content_type: Some(negotiated.content_type.clone()),
            body,
        }),
        Err(err) => Err(ErrorRecord::new(
            ErrorType::Rpc,
            ErrorTag::OperationFailed,
            None,
            Some(err.to_string()),
        )),
    }
}

/// Render the accumulated error sequence as the standard `errors` container.
pub fn respond_errors(
    errors: &[ErrorRecord],
    status: StatusCode,
    negotiated: &Negotiated,
) -> RestResponse {
    let container = errors_container(errors);
    match codec::marshal("errors", &container, negotiated.format) {
        Ok(body) => RestResponse {
            status,
            content_type: Some(negotiated.content_type.clone()),
            body,
        },
        // The container is a fixed serde shape; marshal can only fail on a
        // broken writer. Fall back to the bare status rather than panic in a
        // running server.
        Err(_) => RestResponse {
            status,
            content_type: None,
            body: Vec::new(),
        },
    }
}

/// Standalone error response for failures outside any request context.
pub fn error_response(accept: Option<&str>, records: Vec<ErrorRecord>) -> RestResponse {
    let negotiated = negotiate(accept).unwrap_or_else(|_| Negotiated::default_xml());
    let status = records
        .first()
        .map(|r| r.status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    respond_errors(&records, status, &negotiated)
}
