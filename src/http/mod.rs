//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID set and propagated)
//!     → gateway dispatcher (forward to upstream)
//!     → response.rs (JSON errors, gateway headers)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestIdExt, UuidRequestId, X_REQUEST_ID};
pub use response::{json_error, ErrorBody};
pub use server::{AppState, HttpServer};
