//! Order-prefix routing.
//!
//! Every notification carries an `order_id` whose prefix identifies the
//! downstream service that created the order. The table is built once at
//! startup and only read afterwards.
//!
//! Prefixes are tested in declaration order and the first match wins. A
//! prefix that starts with an earlier prefix can never match, so table
//! construction logs it as shadowed.

use tracing::warn;
use url::Url;

/// A prefix whose destination URL comes from a fixed environment variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteSpec {
    pub prefix: &'static str,
    pub service: &'static str,
    pub env_var: &'static str,
}

/// Built-in routes, in match order.
pub const BUILTIN_ROUTES: &[RouteSpec] = &[
    RouteSpec {
        prefix: "flxbt",
        service: "Flexbit",
        env_var: "FLEXBIT_API_URL",
    },
    RouteSpec {
        prefix: "flx-ott",
        service: "OnTheTok",
        env_var: "ONTHETOK_API_URL",
    },
];

/// One entry of the route table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub prefix: String,
    pub service: String,
    /// `None` when the destination is not configured. The route still
    /// matches; forwarding to it fails.
    pub destination: Option<Url>,
}

impl Route {
    pub fn new(prefix: impl Into<String>, service: impl Into<String>, destination: Option<Url>) -> Self {
        Self {
            prefix: prefix.into(),
            service: service.into(),
            destination,
        }
    }

    pub fn matches(&self, order_id: &str) -> bool {
        order_id.starts_with(&self.prefix)
    }
}

/// Immutable, ordered prefix table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Build a table from routes in match order.
    pub fn new(routes: Vec<Route>) -> Self {
        for (idx, route) in routes.iter().enumerate() {
            if let Some(earlier) = routes[..idx].iter().find(|r| route.prefix.starts_with(&r.prefix)) {
                warn!(
                    prefix = %route.prefix,
                    shadowed_by = %earlier.prefix,
                    "route_prefix_shadowed"
                );
            }
        }

        Self { routes }
    }

    /// Build the built-in table, resolving each destination through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let routes = BUILTIN_ROUTES
            .iter()
            .map(|spec| {
                let destination = lookup(spec.env_var)
                    .and_then(|raw| parse_destination(spec.env_var, &raw));
                Route::new(spec.prefix, spec.service, destination)
            })
            .collect();

        Self::new(routes)
    }

    /// Find the route for an order id. First match in table order wins.
    pub fn resolve(&self, order_id: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.matches(order_id))
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}

/// Parse a destination URL, accepting only absolute http(s) URLs.
fn parse_destination(env_var: &str, raw: &str) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Some(url),
        Ok(url) => {
            warn!(env_var = env_var, scheme = url.scheme(), "destination_unsupported_scheme");
            None
        }
        Err(e) => {
            warn!(env_var = env_var, value = %raw, error = %e, "destination_invalid_url");
            None
        }
    }
}
