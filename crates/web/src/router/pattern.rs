//! Path patterns.
//!
//! A pattern is split on `/` into segments:
//! - `users`: a literal, compared case-sensitively
//! - `:id`: one non-empty segment, captured as `id`
//! - `:rest*` or `*rest`: the remaining segments joined by `/`, only allowed last
//! - `*`: in last position the remaining segments, otherwise exactly one non-empty
//!   segment; unnamed wildcards are captured as `0`, `1`, ... in order
//!
//! A `*` in the middle of a pattern never spans a `/`, unlike URL pattern wildcards.

use crate::PathParams;
use crate::error::RouteError;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// Exactly one non-empty segment.
    One(String),
    /// Every remaining segment, possibly none.
    Rest(String),
}

#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn compile(pattern: &str) -> Result<Self, RouteError> {
        let parts = split_segments(pattern);
        let mut segments = Vec::with_capacity(parts.len());
        let mut names = HashSet::new();
        let mut wildcards = 0_usize;

        for (index, part) in parts.iter().enumerate() {
            let last = index + 1 == parts.len();
            let segment = if *part == "*" {
                let key = wildcards.to_string();
                wildcards += 1;
                if last { Segment::Rest(key) } else { Segment::One(key) }
            } else if let Some(name) = part.strip_prefix('*') {
                check_name(name, pattern)?;
                if !last {
                    return Err(RouteError::VariadicNotLast { name: name.to_string(), pattern: pattern.to_string() });
                }
                Segment::Rest(name.to_string())
            } else if let Some(name) = part.strip_prefix(':') {
                if let Some(name) = name.strip_suffix('*') {
                    check_name(name, pattern)?;
                    if !last {
                        return Err(RouteError::VariadicNotLast { name: name.to_string(), pattern: pattern.to_string() });
                    }
                    Segment::Rest(name.to_string())
                } else {
                    check_name(name, pattern)?;
                    Segment::One(name.to_string())
                }
            } else {
                Segment::Literal((*part).to_string())
            };

            if let Segment::One(key) | Segment::Rest(key) = &segment
                && !names.insert(key.clone())
            {
                return Err(RouteError::DuplicateParam { name: key.clone(), pattern: pattern.to_string() });
            }
            segments.push(segment);
        }

        Ok(Self { raw: pattern.to_string(), segments })
    }

    /// Matches `path` against this pattern, returning the captured parameters in pattern order.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let parts = split_segments(path);
        let rest = matches!(self.segments.last(), Some(Segment::Rest(_)));
        let fixed = if rest { self.segments.len() - 1 } else { self.segments.len() };

        if parts.len() < fixed || (!rest && parts.len() != fixed) {
            return None;
        }

        let mut params = PathParams::with_capacity(self.segments.len());
        for (index, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(literal) => {
                    if parts[index] != literal.as_str() {
                        return None;
                    }
                }
                Segment::One(key) => {
                    if parts[index].is_empty() {
                        return None;
                    }
                    params.push(key.as_str(), parts[index]);
                }
                Segment::Rest(key) => params.push(key.as_str(), parts[index..].join("/")),
            }
        }
        Some(params)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn check_name(name: &str, pattern: &str) -> Result<(), RouteError> {
    if name.is_empty() {
        return Err(RouteError::EmptyParamName { pattern: pattern.to_string() });
    }
    Ok(())
}

/// Splits on `/`, dropping one leading and one trailing empty segment.
fn split_segments(path: &str) -> Vec<&str> {
    let path = path.strip_prefix('/').unwrap_or(path);
    if path.is_empty() {
        return Vec::new();
    }
    let path = path.strip_suffix('/').unwrap_or(path);
    path.split('/').collect()
}

/// Joins a base path and a route path with exactly one `/` between them.
///
/// An empty route path stands for the base path itself.
pub fn join_paths(base: &str, path: &str) -> String {
    if path.is_empty() {
        return base.to_string();
    }
    if base.is_empty() {
        return path.to_string();
    }
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{base}{}", &path[1..]),
        (false, false) => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pattern: &str, path: &str) -> Option<Vec<(String, String)>> {
        PathPattern::compile(pattern)
            .unwrap()
            .matches(path)
            .map(|params| params.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    fn pairs(items: &[(&str, &str)]) -> Option<Vec<(String, String)>> {
        Some(items.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect())
    }

    #[test]
    fn test_literal() {
        assert_eq!(params("/", "/"), pairs(&[]));
        assert_eq!(params("/", ""), pairs(&[]));
        assert_eq!(params("/hello", "/hello"), pairs(&[]));
        assert_eq!(params("/hello", "/hello/"), pairs(&[]));
        assert_eq!(params("/hello", "/Hello"), None);
        assert_eq!(params("/hello", "/hello/world"), None);
        assert_eq!(params("/hello/world", "/hello"), None);
    }

    #[test]
    fn test_named_params() {
        assert_eq!(params("/users/:id", "/users/42"), pairs(&[("id", "42")]));
        assert_eq!(params("/users/:id", "/users/"), None);
        assert_eq!(params("/users/:id", "/users//"), None);
        assert_eq!(
            params("/:org/:repo/issues/:number", "/rust-lang/rust/issues/1"),
            pairs(&[("org", "rust-lang"), ("repo", "rust"), ("number", "1")])
        );
    }

    #[test]
    fn test_variadic() {
        assert_eq!(params("/files/:rest*", "/files/a/b/c"), pairs(&[("rest", "a/b/c")]));
        assert_eq!(params("/files/:rest*", "/files"), pairs(&[("rest", "")]));
        assert_eq!(params("/files/:rest*", "/other/a"), None);
        assert_eq!(params("/files/*rest", "/files/a/b/c"), pairs(&[("rest", "a/b/c")]));
        assert_eq!(params("/files/*rest", "/files"), pairs(&[("rest", "")]));
    }

    #[test]
    fn test_wildcards() {
        assert_eq!(params("/files/*", "/files/a/b/c"), pairs(&[("0", "a/b/c")]));
        assert_eq!(params("/*/edit/*", "/post/edit/a/b"), pairs(&[("0", "post"), ("1", "a/b")]));
        assert_eq!(params("/*/edit", "/post/edit"), pairs(&[("0", "post")]));
        assert_eq!(params("/*/edit", "/a/b/edit"), None);
        assert_eq!(params("*", "/anything/at/all"), pairs(&[("0", "anything/at/all")]));
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(matches!(PathPattern::compile("/a/:id/:id"), Err(RouteError::DuplicateParam { .. })));
        assert!(matches!(PathPattern::compile("/a/:"), Err(RouteError::EmptyParamName { .. })));
        assert!(matches!(PathPattern::compile("/a/:*"), Err(RouteError::EmptyParamName { .. })));
        assert!(matches!(PathPattern::compile("/a/:rest*/b"), Err(RouteError::VariadicNotLast { .. })));
        assert!(matches!(PathPattern::compile("/:0/*"), Err(RouteError::DuplicateParam { .. })));
        assert!(matches!(PathPattern::compile("/a/*rest/b"), Err(RouteError::VariadicNotLast { .. })));
        assert!(matches!(PathPattern::compile("/:rest/*rest"), Err(RouteError::DuplicateParam { .. })));
    }

    #[test]
    fn test_join_paths() {
        assert_eq!(join_paths("/api", "/users"), "/api/users");
        assert_eq!(join_paths("/api/", "/users"), "/api/users");
        assert_eq!(join_paths("/api", "users"), "/api/users");
        assert_eq!(join_paths("/api/", "users"), "/api/users");
        assert_eq!(join_paths("/api", ""), "/api");
        assert_eq!(join_paths("", "/users"), "/users");
    }
}
