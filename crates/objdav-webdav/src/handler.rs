//! Request dispatch: COPY and MOVE onto the tree mutator.

use crate::error::{ServerError, ServerResult};
use crate::headers::{derive_overwrite, destination_path, request_path};
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, ALLOW, CONTENT_TYPE};
use hyper::http::request::Parts;
use hyper::{Request, Response, StatusCode};
use objdav_tree::TreeMutator;
use tracing::{debug, warn};

/// Methods this server answers.
pub const ALLOWED_METHODS: &str = "OPTIONS, COPY, MOVE";

/// WebDAV compliance class advertised in the `DAV` header.
pub const DAV_COMPLIANCE: &str = "1";

/// Response body type.
pub type Body = Full<Bytes>;

/// Handles WebDAV requests against a shared tree.
#[derive(Clone)]
pub struct DavHandler {
    mutator: TreeMutator,
}

impl DavHandler {
    /// Create a handler over a mutator.
    pub fn new(mutator: TreeMutator) -> Self {
        Self { mutator }
    }

    /// The mutator requests are dispatched to.
    pub fn mutator(&self) -> &TreeMutator {
        &self.mutator
    }

    /// Serve one request. Never fails; errors become status codes.
    ///
    /// Request bodies are ignored.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<Body> {
        let (parts, _) = req.into_parts();
        let result = match parts.method.as_str() {
            "OPTIONS" => Ok(options_response()),
            "COPY" => self.transfer(&parts, Operation::Copy).await,
            "MOVE" => self.transfer(&parts, Operation::Move).await,
            other => Err(ServerError::NotImplemented(other.to_string())),
        };

        match result {
            Ok(resp) => resp,
            Err(e) => {
                let status = e.status_code();
                let category = e.category_name();
                if status.is_server_error() && status != StatusCode::NOT_IMPLEMENTED {
                    warn!(method = %parts.method, uri = %parts.uri, error = %e, error.category = category, "Request failed");
                } else {
                    debug!(method = %parts.method, uri = %parts.uri, error = %e, error.category = category, %status, "Request rejected");
                }
                text_response(status, e.to_string())
            }
        }
    }

    async fn transfer(&self, parts: &Parts, operation: Operation) -> ServerResult<Response<Body>> {
        let source = request_path(&parts.uri)?;
        let destination = destination_path(&parts.headers)?;
        let overwrite = derive_overwrite(&parts.headers);
        debug!(?operation, %source, %destination, %overwrite, "Transfer request");

        match operation {
            Operation::Copy => self.mutator.copy(&source, &destination, overwrite).await?,
            Operation::Move => {
                self.mutator
                    .move_entry(&source, &destination, overwrite)
                    .await?;
            }
        }
        Ok(text_response(StatusCode::CREATED, String::new()))
    }
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    Copy,
    Move,
}

fn options_response() -> Response<Body> {
    let mut resp = Response::new(Full::new(Bytes::new()));
    let headers = resp.headers_mut();
    headers.insert(ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
    headers.insert("DAV", HeaderValue::from_static(DAV_COMPLIANCE));
    resp
}

fn text_response(status: StatusCode, body: String) -> Response<Body> {
    let mut resp = Response::new(Full::new(Bytes::from(body)));
    *resp.status_mut() = status;
    resp.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    resp
}
