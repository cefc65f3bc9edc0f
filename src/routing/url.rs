//! URL generation: canonical paths back to their externally visible form.

use crate::routing::pattern::rewrite;
use crate::routing::router::RouteTable;

/// Generates public URLs from canonical paths. Holds the deployment base
/// path ("" when the application is mounted at the web root).
pub struct UrlGenerator<'a> {
    table: &'a RouteTable,
    base_path: String,
}

impl<'a> UrlGenerator<'a> {
    pub fn new(table: &'a RouteTable, base_path: impl Into<String>) -> Self {
        UrlGenerator {
            table,
            base_path: base_path.into(),
        }
    }

    /// Generate the public URL for a canonical path. `layout`, when it names
    /// a known logical prefix, scopes the path under that prefix before
    /// route rewriting.
    pub fn url(&self, path: &str, layout: Option<&str>) -> String {
        let mut url = path.to_string();
        if let Some(layout) = layout {
            if self.table.has_prefix_name(layout) {
                url = format!("{}/{}", layout, url);
            }
        }

        for route in self.table.routes() {
            if let Some(rewritten) = rewrite(&route.forward_regex, &url, &route.redirect_template) {
                url = rewritten;
                break;
            }
        }

        for (segment, name) in self.table.prefixes() {
            if url.starts_with(name.as_str()) {
                url = url.replacen(name.as_str(), segment.as_str(), 1);
                break;
            }
        }

        self.apply_base(url)
    }

    /// Prepend the base path to a static asset link, without route or
    /// prefix rewriting.
    pub fn webroot(&self, path: &str) -> String {
        self.apply_base(path.to_string())
    }

    fn apply_base(&self, url: String) -> String {
        if !self.base_path.is_empty() && self.base_path != "/" {
            format!("{}/{}", self.base_path, url)
        } else if url != "/" {
            format!("/{}", url)
        } else {
            url
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RouteTable {
        let mut table = RouteTable::new();
        table.connect("", "home/index").unwrap();
        table.connect("/post/:id", "post/view/id:[0-9]+").unwrap();
        table.connect("/docs/*", "page/view/*").unwrap();
        table.prefix("backstage", "admin");
        table
    }

    #[test]
    fn generates_public_form_from_canonical() {
        let table = table();
        let gen = UrlGenerator::new(&table, "");
        assert_eq!(gen.url("post/view/id:42", None), "/post/42");
    }

    #[test]
    fn round_trips_with_resolution() {
        use crate::routing::RequestResolver;
        let table = table();
        let gen = UrlGenerator::new(&table, "");
        let public = gen.url("post/view/id:42", None);
        let req = RequestResolver::new(&table).parse(&public);
        assert_eq!(req.controller, "post");
        assert_eq!(req.action, "view");
        assert_eq!(req.params, vec!["42".to_string()]);
    }

    #[test]
    fn wildcard_round_trips_unescaped() {
        let table = table();
        let gen = UrlGenerator::new(&table, "");
        assert_eq!(gen.url("page/view/guide/install", None), "/docs/guide/install");
    }

    #[test]
    fn unmatched_path_only_gains_leading_slash() {
        let table = table();
        let gen = UrlGenerator::new(&table, "");
        assert_eq!(gen.url("member/edit/3", None), "/member/edit/3");
    }

    #[test]
    fn layout_scopes_under_prefix_alias() {
        let table = table();
        let gen = UrlGenerator::new(&table, "");
        assert_eq!(gen.url("post/index", Some("admin")), "/backstage/post/index");
        // unknown layout is ignored
        assert_eq!(gen.url("post/index", Some("nowhere")), "/post/index");
    }

    #[test]
    fn logical_prefix_rewrites_to_alias_segment() {
        let table = table();
        let gen = UrlGenerator::new(&table, "");
        assert_eq!(gen.url("admin/post/index", None), "/backstage/post/index");
    }

    #[test]
    fn base_path_is_prepended() {
        let table = table();
        let gen = UrlGenerator::new(&table, "/blog");
        assert_eq!(gen.url("post/view/id:42", None), "/blog/post/42");
        assert_eq!(gen.webroot("css/site.css"), "/blog/css/site.css");
    }

    #[test]
    fn webroot_skips_route_rewriting() {
        let table = table();
        let gen = UrlGenerator::new(&table, "");
        assert_eq!(gen.webroot("post/view/id:42"), "/post/view/id:42");
    }
}
