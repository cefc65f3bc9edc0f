//! Route pattern compilation.
//!
//! A route maps a public URL shape (the redirect pattern, e.g. `/post/:id`)
//! to a canonical internal path (e.g. `post/view/id:[0-9]+`). Each canonical
//! segment written `name:regex` declares a named parameter; a trailing `/*`
//! captures the remaining path as `args`. Compilation produces, per route,
//! a matcher and a placeholder template for each direction.

use crate::error::RouteError;
use regex::Regex;

/// A compiled route. Built once at registration, immutable afterwards.
#[derive(Clone, Debug)]
pub struct Route {
    /// Canonical path as registered, with `name:regex` markers.
    pub canonical: String,
    /// Matches the canonical form with parameter values substituted
    /// (`post/view/id:42`). Used by URL generation.
    pub forward_regex: Regex,
    /// Canonical path with `:name:` placeholders, filled during resolution.
    pub reverse_template: String,
    /// Matches the public form (`post/42`). Used by request resolution.
    pub redirect_regex: Regex,
    /// Public path with `:name:` placeholders, filled during generation.
    pub redirect_template: String,
    /// Declared parameters in canonical order: (name, regex source).
    pub params: Vec<(String, String)>,
    pub has_wildcard: bool,
}

/// Marker for `name:regex` parameter segments in canonical patterns.
fn marker() -> Regex {
    Regex::new(r"([a-z0-9_]+):([^/]+)").expect("marker pattern")
}

/// Marker for bare `:name` placeholders in redirect patterns.
fn placeholder() -> Regex {
    Regex::new(r":([a-z0-9_]+)").expect("placeholder pattern")
}

const WILDCARD_GROUP: &str = "(?P<args>/?.*)";

fn anchored(src: &str, pattern: &str) -> Result<Regex, RouteError> {
    Regex::new(&format!("^{}$", src)).map_err(|source| RouteError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Compile a redirect/canonical pattern pair into a [`Route`]. Both patterns
/// are trimmed of leading and trailing separators so matching operates on
/// trimmed paths throughout.
pub(crate) fn compile(redirect: &str, canonical: &str) -> Result<Route, RouteError> {
    let redirect = redirect.trim_matches('/');
    let canonical = canonical.trim_matches('/');
    let marker = marker();

    let forward_src = marker.replace_all(canonical, "${1}:(?P<${1}>${2})");
    let forward_src = forward_src.replace("/*", WILDCARD_GROUP);
    let forward_regex = anchored(&forward_src, canonical)?;

    let reverse_template = marker
        .replace_all(canonical, ":${1}:")
        .replace("/*", ":args:");

    let mut params = Vec::new();
    for segment in canonical.split('/') {
        if let Some(idx) = segment.find(':') {
            if idx > 0 {
                params.push((segment[..idx].to_string(), segment[idx + 1..].to_string()));
            }
        }
    }

    let mut redirect_src = redirect.replace("/*", WILDCARD_GROUP);
    for (name, rx) in &params {
        redirect_src = redirect_src.replace(
            &format!(":{}", name),
            &format!("(?P<{}>{})", name, rx),
        );
    }
    let redirect_regex = anchored(&redirect_src, redirect)?;

    let redirect_template = placeholder()
        .replace_all(redirect, ":${1}:")
        .replace("/*", ":args:");

    Ok(Route {
        canonical: canonical.to_string(),
        forward_regex,
        reverse_template,
        redirect_regex,
        redirect_template,
        params,
        has_wildcard: canonical.contains('*'),
    })
}

/// Substitute every named capture of `regex` over `input` into the `:name:`
/// placeholders of `template`. Unmatched optional groups substitute as
/// empty (absent parameters, not errors).
pub(crate) fn rewrite(regex: &Regex, input: &str, template: &str) -> Option<String> {
    let caps = regex.captures(input)?;
    let mut out = template.to_string();
    for name in regex.capture_names().flatten() {
        let value = caps.name(name).map(|m| m.as_str()).unwrap_or("");
        out = out.replace(&format!(":{}:", name), value);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_named_parameter_segments() {
        let route = compile("/post/:id", "post/view/id:[0-9]+").unwrap();
        assert_eq!(route.params, vec![("id".to_string(), "[0-9]+".to_string())]);
        assert_eq!(route.reverse_template, "post/view/:id:");
        assert_eq!(route.redirect_template, "post/:id:");
        assert!(route.redirect_regex.is_match("post/42"));
        assert!(!route.redirect_regex.is_match("post/abc"));
        assert!(route.forward_regex.is_match("post/view/id:42"));
        assert!(!route.has_wildcard);
    }

    #[test]
    fn compiles_wildcard_suffix() {
        let route = compile("/page/*", "page/view/*").unwrap();
        assert!(route.has_wildcard);
        assert_eq!(route.reverse_template, "page/view:args:");
        assert_eq!(route.redirect_template, "page:args:");
        let caps = route.redirect_regex.captures("page/a/b").unwrap();
        assert_eq!(&caps["args"], "/a/b");
    }

    #[test]
    fn rewrite_fills_placeholders() {
        let route = compile("/post/:id", "post/view/id:[0-9]+").unwrap();
        let out = rewrite(&route.redirect_regex, "post/42", &route.reverse_template);
        assert_eq!(out.as_deref(), Some("post/view/42"));
    }

    #[test]
    fn rewrite_returns_none_on_no_match() {
        let route = compile("/post/:id", "post/view/id:[0-9]+").unwrap();
        assert!(rewrite(&route.redirect_regex, "member/42", &route.reverse_template).is_none());
    }

    #[test]
    fn invalid_parameter_regex_is_reported() {
        let err = compile("/post/:id", "post/view/id:[0-9").unwrap_err();
        assert!(matches!(err, RouteError::Pattern { .. }));
    }
}
