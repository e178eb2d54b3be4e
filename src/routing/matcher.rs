//! Dynamic route matching.
//!
//! # Responsibilities
//! - Compile a route containing `:name` / `*name` segments into a matcher
//! - Match a request path and extract captured parameters in declaration order
//!
//! # Design Decisions
//! - Compiled once per route entry when the table is built, never per request
//! - Placeholders only span whole segments
//! - Literal segments are matched case-sensitively
//! - `:name` captures exactly one segment; `*name` captures one or more

use regex::Regex;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Path parameters captured from a dynamic route, in placeholder order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(Vec<(String, String)>);

impl PathParams {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// Value of the named parameter.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for PathParams {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// A compiled matcher for a route with dynamic segments.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    route: String,
    regex: Regex,
    params: Vec<String>,
}

impl RoutePattern {
    /// Returns true if the route contains at least one placeholder segment.
    pub fn is_dynamic(route: &str) -> bool {
        route
            .split('/')
            .any(|segment| segment.starts_with(':') || segment.starts_with('*'))
    }

    /// Compile a normalized route (`users/:id`, `files/*rest`) into a matcher.
    pub fn compile(route: &str) -> Result<Self, regex::Error> {
        let mut pattern = String::from("^");
        let mut params = Vec::new();

        for (i, segment) in route.split('/').enumerate() {
            if i > 0 {
                pattern.push('/');
            }
            if let Some(name) = segment.strip_prefix(':') {
                pattern.push_str("([^/]+)");
                params.push(name.to_string());
            } else if let Some(name) = segment.strip_prefix('*') {
                pattern.push_str("(.+)");
                params.push(if name.is_empty() { "*".to_string() } else { name.to_string() });
            } else {
                pattern.push_str(&regex::escape(segment));
            }
        }
        pattern.push('$');

        Ok(Self {
            route: route.to_string(),
            regex: Regex::new(&pattern)?,
            params,
        })
    }

    /// The route this pattern was compiled from.
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Placeholder names in declaration order.
    pub fn param_names(&self) -> &[String] {
        &self.params
    }

    /// Match a path (without prefix or surrounding slashes).
    pub fn captures(&self, path: &str) -> Option<PathParams> {
        let captures = self.regex.captures(path)?;
        let mut params = PathParams::new();
        for (i, name) in self.params.iter().enumerate() {
            let value = captures.get(i + 1).map(|m| m.as_str()).unwrap_or_default();
            params.push(name.clone(), value);
        }
        Some(params)
    }
}

impl PartialEq for RoutePattern {
    fn eq(&self, other: &Self) -> bool {
        self.route == other.route
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_param() {
        let pattern = RoutePattern::compile("products/:id").unwrap();

        let params = pattern.captures("products/42").unwrap();
        assert_eq!(params.get("id"), Some("42"));
        assert_eq!(params.len(), 1);

        assert!(pattern.captures("products").is_none());
        assert!(pattern.captures("products/42/reviews").is_none());
        assert!(pattern.captures("other/42").is_none());
    }

    #[test]
    fn test_params_keep_declaration_order() {
        let pattern = RoutePattern::compile("shops/:shop/items/:item").unwrap();
        let params = pattern.captures("shops/north/items/7").unwrap();

        let collected: Vec<_> = params.iter().collect();
        assert_eq!(collected, vec![("shop", "north"), ("item", "7")]);
        assert_eq!(pattern.param_names(), &["shop".to_string(), "item".to_string()]);
    }

    #[test]
    fn test_catch_all() {
        let pattern = RoutePattern::compile("files/*rest").unwrap();
        let params = pattern.captures("files/a/b/c.txt").unwrap();
        assert_eq!(params.get("rest"), Some("a/b/c.txt"));
        assert!(pattern.captures("files").is_none());
    }

    #[test]
    fn test_literal_segments_are_escaped() {
        let pattern = RoutePattern::compile("v1.0/:id").unwrap();
        assert!(pattern.captures("v1.0/9").is_some());
        assert!(pattern.captures("v1x0/9").is_none());
    }

    #[test]
    fn test_is_dynamic() {
        assert!(RoutePattern::is_dynamic("users/:id"));
        assert!(RoutePattern::is_dynamic("*all"));
        assert!(!RoutePattern::is_dynamic("users/me"));
        assert!(!RoutePattern::is_dynamic(""));
    }

    #[test]
    fn test_params_serialize_as_object() {
        let mut params = PathParams::new();
        params.push("id", "7");
        assert_eq!(serde_json::to_string(&params).unwrap(), r#"{"id":"7"}"#);
    }
}
