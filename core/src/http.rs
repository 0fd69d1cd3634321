//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! These types describe HTTP requests as plain data. The core crate builds
//! `HttpRequest` values without ever touching the network — the caller (host)
//! is responsible for executing the actual I/O and feeding the raw response
//! body back into the originating call's `parse` method.
//!
//! All fields use owned types (`String`, `Vec`) so values can be handed to
//! any transport without lifetime concerns.

/// HTTP method for a request.
///
/// Calls carrying a form body go out as `Post`; query-only calls as `Get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// An HTTP request described as plain data.
///
/// Built by [`ApiCall::request`](crate::call::ApiCall::request). The caller
/// executes this request against the network and passes the response body to
/// the same call instance for parsing.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}
