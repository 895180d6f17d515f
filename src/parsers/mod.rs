//! HTTP parsing and rendering for the gate.
//!
//! Requests are parsed only as far as the head; responses are always fully
//! buffered since the gate never serves anything larger than its configured
//! forbidden page.

mod request;
mod response;

pub use request::HttpRequest;
pub use response::HttpResponse;
