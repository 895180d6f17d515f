//! Routing module.
//!
//! The gate answers exactly one route, `GET /`. Everything else is a 404.

use tracing::debug;

/// Result of route matching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// `GET /`, with or without a query string.
    Root,
    NotFound,
}

/// Match a request method and target against the gate's single route.
pub fn match_route(method: &str, target: &str) -> Route {
    let path = strip_query(target);
    let route = if method == "GET" && path == "/" {
        Route::Root
    } else {
        Route::NotFound
    };
    debug!(method, path, ?route, "Matched route");
    route
}

fn strip_query(target: &str) -> &str {
    target
        .split_once(|c: char| c == '?' || c == '#')
        .map_or(target, |(path, _)| path)
}
