//! WebDAV COPY/MOVE front end for the objdav cached tree.
//!
//! A small hyper server that accepts `COPY` and `MOVE` requests, reads the
//! `Destination` and `Overwrite` headers and dispatches to a
//! [`TreeMutator`](objdav_tree::TreeMutator). Listing and content transfer
//! are out of scope: every other method except `OPTIONS` answers
//! `501 Not Implemented`.
//!
//! # Status codes
//!
//! | outcome                                   | status |
//! |-------------------------------------------|--------|
//! | success                                   | 201    |
//! | missing or malformed `Destination`        | 400    |
//! | source or destination parent missing      | 404    |
//! | destination parent is a file              | 409    |
//! | destination exists, no `Overwrite: Y`     | 412    |
//! | destination inside the source, root moves | 403    |
//! | backend failure                           | 502    |
//!
//! # Example
//!
//! ```ignore
//! use objdav_tree::{MemoryBackend, NodeRegistry, TreeMutator};
//! use objdav_webdav::{ObjDavServer, ServerConfig};
//!
//! let store = Arc::new(MemoryBackend::new());
//! let registry = NodeRegistry::new(store.clone(), store.root_real_path()).into_shared();
//! let server = ObjDavServer::start(TreeMutator::new(store, registry), ServerConfig::default()).await?;
//! println!("Serving on {}", server.url());
//! ```
//!
//! # Security
//!
//! By default, the server binds to localhost (127.0.0.1) only.

mod error;
mod handler;
mod headers;
mod server;

pub use error::{category_to_status, ServerError, ServerResult};
pub use handler::{DavHandler, ALLOWED_METHODS, DAV_COMPLIANCE};
pub use headers::{derive_overwrite, destination_path, DESTINATION_HEADER};
pub use server::{ObjDavServer, ServerConfig};
