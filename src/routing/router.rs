//! Route lookup.
//!
//! # Responsibilities
//! - Store the ordered route table
//! - Look up the route for a request path
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan; the table has four entries
//! - Unmatched paths get the plain-text report, never a 404

use std::fmt;

use crate::routing::matcher::{Matcher, PathPrefixMatcher, PathSuffixMatcher};

/// Behavior selected for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Hostname,
    Env,
    Stream,
    Json,
    Plain,
}

impl Route {
    /// Stable label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Hostname => "hostname",
            Route::Env => "env",
            Route::Stream => "stream",
            Route::Json => "json",
            Route::Plain => "plain",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered, first-match route table.
#[derive(Debug)]
pub struct RouteTable {
    entries: Vec<(Box<dyn Matcher>, Route)>,
    fallback: Route,
}

impl RouteTable {
    /// The server's route table: hostname, env, stream, then JSON by suffix.
    pub fn standard() -> Self {
        Self {
            entries: vec![
                prefix("/hostname", Route::Hostname),
                prefix("/env", Route::Env),
                prefix("/stream", Route::Stream),
                suffix(".json", Route::Json),
            ],
            fallback: Route::Plain,
        }
    }

    /// Find the route for a request path.
    pub fn match_path(&self, path: &str) -> Route {
        self.entries
            .iter()
            .find(|(matcher, _)| matcher.matches(path))
            .map(|(_, route)| *route)
            .unwrap_or(self.fallback)
    }
}

fn prefix(prefix: &str, route: Route) -> (Box<dyn Matcher>, Route) {
    (Box::new(PathPrefixMatcher::new(prefix)), route)
}

fn suffix(suffix: &str, route: Route) -> (Box<dyn Matcher>, Route) {
    (Box::new(PathSuffixMatcher::new(suffix)), route)
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_routes() {
        let table = RouteTable::standard();
        assert_eq!(table.match_path("/hostname"), Route::Hostname);
        assert_eq!(table.match_path("/hostnames/a"), Route::Hostname);
        assert_eq!(table.match_path("/env"), Route::Env);
        assert_eq!(table.match_path("/stream/slow"), Route::Stream);
        assert_eq!(table.match_path("/api/report.json"), Route::Json);
        assert_eq!(table.match_path("/"), Route::Plain);
        assert_eq!(table.match_path("/anything/else"), Route::Plain);
    }

    #[test]
    fn test_first_match_wins() {
        let table = RouteTable::standard();
        // Prefix routes take precedence over the JSON suffix.
        assert_eq!(table.match_path("/env.json"), Route::Env);
        assert_eq!(table.match_path("/stream.json"), Route::Stream);
    }
}
