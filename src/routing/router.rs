//! Route table and request resolution.
//!
//! Registration (`connect`, `prefix`) happens once at startup; the table is
//! effectively immutable afterwards. Matching is attempted in registration
//! order and the first match wins.

use crate::error::RouteError;
use crate::routing::pattern::{compile, rewrite, Route};

/// Ordered collection of compiled routes plus prefix aliases
/// (URL segment -> logical prefix name).
#[derive(Default)]
pub struct RouteTable {
    routes: Vec<Route>,
    prefixes: Vec<(String, String)>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route: `redirect` is the externally visible shape
    /// (`/post/:id`), `canonical` the internal path with parameter markers
    /// (`post/view/id:[0-9]+`). Appended at the end of the table; earlier
    /// registrations take priority.
    pub fn connect(&mut self, redirect: &str, canonical: &str) -> Result<(), RouteError> {
        let route = compile(redirect, canonical)?;
        self.routes.push(route);
        Ok(())
    }

    /// Register a prefix alias: requests whose first segment is `segment`
    /// resolve under the logical prefix `name`.
    pub fn prefix(&mut self, segment: &str, name: &str) {
        self.prefixes
            .push((segment.to_string(), name.to_string()));
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub(crate) fn prefixes(&self) -> &[(String, String)] {
        &self.prefixes
    }

    pub(crate) fn prefix_name_for_segment(&self, segment: &str) -> Option<&str> {
        self.prefixes
            .iter()
            .find(|(s, _)| s == segment)
            .map(|(_, name)| name.as_str())
    }

    pub(crate) fn has_prefix_name(&self, name: &str) -> bool {
        self.prefixes.iter().any(|(_, n)| n == name)
    }
}

/// Result of resolving an inbound path.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedRequest {
    pub controller: String,
    pub action: String,
    pub prefix: Option<String>,
    pub params: Vec<String>,
}

/// Resolves raw request paths against a route table.
pub struct RequestResolver<'a> {
    table: &'a RouteTable,
}

impl<'a> RequestResolver<'a> {
    pub fn new(table: &'a RouteTable) -> Self {
        RequestResolver { table }
    }

    /// Resolve `path` to controller, action, prefix and positional params.
    ///
    /// An empty path substitutes the first registered route's canonical
    /// definition as the default landing route. Paths matching no route pass
    /// through with their raw segments interpreted directly.
    pub fn parse(&self, path: &str) -> ResolvedRequest {
        let mut url = path.trim_matches('/').to_string();
        if url.is_empty() {
            url = self
                .table
                .routes()
                .first()
                .map(|r| r.canonical.clone())
                .unwrap_or_default();
        } else {
            for route in self.table.routes() {
                if let Some(rewritten) = rewrite(&route.redirect_regex, &url, &route.reverse_template) {
                    url = rewritten;
                    break;
                }
            }
        }

        let mut segments: Vec<&str> = url.split('/').filter(|s| !s.is_empty()).collect();
        let mut prefix = None;
        if let Some(first) = segments.first() {
            if let Some(name) = self.table.prefix_name_for_segment(first) {
                prefix = Some(name.to_string());
                segments.remove(0);
            }
        }

        let controller = segments.first().map(|s| s.to_string()).unwrap_or_default();
        let mut action = segments
            .get(1)
            .map(|s| s.to_string())
            .unwrap_or_else(|| "index".to_string());

        // An action named `<prefix>_<suffix>` declares its prefix
        // independently of the path alias.
        for (_, name) in self.table.prefixes() {
            if let Some(suffix) = action.strip_prefix(&format!("{}_", name)) {
                prefix = Some(name.clone());
                action = suffix.to_string();
            }
        }

        let params = segments
            .iter()
            .skip(2)
            .map(|s| s.to_string())
            .collect();

        ResolvedRequest {
            controller,
            action,
            prefix,
            params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RouteTable {
        let mut table = RouteTable::new();
        table
            .connect("", "home/index")
            .unwrap();
        table
            .connect("/post/:id", "post/view/id:[0-9]+")
            .unwrap();
        table
            .connect("/article/:slug", "post/read/slug:[a-z-]+")
            .unwrap();
        table.connect("/docs/*", "page/view/*").unwrap();
        table.prefix("backstage", "admin");
        table
    }

    #[test]
    fn resolves_registered_route() {
        let table = table();
        let req = RequestResolver::new(&table).parse("/post/42");
        assert_eq!(
            req,
            ResolvedRequest {
                controller: "post".into(),
                action: "view".into(),
                prefix: None,
                params: vec!["42".into()],
            }
        );
    }

    #[test]
    fn empty_path_lands_on_first_route() {
        let table = table();
        let req = RequestResolver::new(&table).parse("/");
        assert_eq!(req.controller, "home");
        assert_eq!(req.action, "index");
        assert!(req.params.is_empty());
    }

    #[test]
    fn first_registered_match_wins() {
        let mut table = RouteTable::new();
        table.connect("/p/:id", "post/view/id:[0-9]+").unwrap();
        table.connect("/p/:num", "archive/show/num:[0-9]+").unwrap();
        let req = RequestResolver::new(&table).parse("/p/7");
        assert_eq!(req.controller, "post");
        assert_eq!(req.action, "view");
        assert_eq!(req.params, vec!["7".to_string()]);
    }

    #[test]
    fn unmatched_path_passes_through() {
        let table = table();
        let req = RequestResolver::new(&table).parse("/member/edit/3/extra");
        assert_eq!(req.controller, "member");
        assert_eq!(req.action, "edit");
        assert_eq!(req.params, vec!["3".to_string(), "extra".to_string()]);
    }

    #[test]
    fn missing_action_defaults_to_index() {
        let table = table();
        let req = RequestResolver::new(&table).parse("/member");
        assert_eq!(req.controller, "member");
        assert_eq!(req.action, "index");
    }

    #[test]
    fn wildcard_captures_remaining_path() {
        let table = table();
        let req = RequestResolver::new(&table).parse("/docs/guide/install");
        assert_eq!(req.controller, "page");
        assert_eq!(req.action, "view");
        assert_eq!(req.params, vec!["guide".to_string(), "install".to_string()]);
    }

    #[test]
    fn unmatched_optional_group_resolves_as_absent_param() {
        let mut table = RouteTable::new();
        table
            .connect("/blog(/:page)?", "post/index/page:[0-9]+")
            .unwrap();
        let resolver = RequestResolver::new(&table);
        let with_page = resolver.parse("/blog/2");
        assert_eq!(with_page.controller, "post");
        assert_eq!(with_page.action, "index");
        assert_eq!(with_page.params, vec!["2".to_string()]);
        let without_page = resolver.parse("/blog");
        assert_eq!(without_page.controller, "post");
        assert_eq!(without_page.action, "index");
        assert!(without_page.params.is_empty());
    }

    #[test]
    fn prefix_segment_is_recorded_and_dropped() {
        let table = table();
        let req = RequestResolver::new(&table).parse("/backstage/post/edit/3");
        assert_eq!(req.prefix.as_deref(), Some("admin"));
        assert_eq!(req.controller, "post");
        assert_eq!(req.action, "edit");
        assert_eq!(req.params, vec!["3".to_string()]);
    }

    #[test]
    fn action_can_declare_its_own_prefix() {
        let table = table();
        let req = RequestResolver::new(&table).parse("/post/admin_edit/3");
        assert_eq!(req.prefix.as_deref(), Some("admin"));
        assert_eq!(req.action, "edit");
        assert_eq!(req.params, vec!["3".to_string()]);
    }
}
