// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Alias, context path and URL pattern helpers.

use std::fmt;

use super::WebError;

/// Check the syntax of an HttpService alias.
///
/// An alias starts with `/` and does not end with `/`, except the root alias
/// `/` itself.
pub fn validate_alias(alias: &str) -> Result<(), WebError> {
    if alias.is_empty() {
        return Err(WebError::Namespace("alias must not be empty".to_string()));
    }
    if !alias.starts_with('/') {
        return Err(WebError::Namespace(format!(
            "alias [{alias}] does not start with a slash (/)"
        )));
    }
    if alias.len() > 1 && alias.ends_with('/') {
        return Err(WebError::Namespace(format!(
            "alias [{alias}] ends with a slash (/)"
        )));
    }
    Ok(())
}

/// Check and normalise a context path: `/` for the root, otherwise a leading
/// slash and no trailing one.
pub fn normalize_context_path(path: &str) -> Result<String, WebError> {
    let trimmed = path.trim();
    if trimmed.is_empty() || trimmed == "/" {
        return Ok("/".to_string());
    }
    if trimmed.contains(['*', '?', '#', ' ']) {
        return Err(WebError::illegal_argument(format!(
            "invalid context path [{path}]"
        )));
    }
    let with_slash = if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    };
    Ok(with_slash.trim_end_matches('/').to_string())
}

/// Prefix an alias with the context path it lives in.
///
/// `("/", "/a")` gives `/a`, `("/war", "/a")` gives `/war/a` and
/// `("/war", "/")` gives `/war`.
pub fn qualify(context_path: &str, alias: &str) -> String {
    if context_path == "/" {
        alias.to_string()
    } else if alias == "/" {
        context_path.to_string()
    } else {
        format!("{context_path}{alias}")
    }
}

/// Iterate a path and each of its parents, ending with `/`.
///
/// `/a/b/c` yields `/a/b/c`, `/a/b`, `/a`, `/`.
pub fn alias_prefixes(path: &str) -> impl Iterator<Item = &str> {
    let mut current = Some(path).filter(|p| !p.is_empty());
    let mut root_pending = true;
    std::iter::from_fn(move || {
        if let Some(candidate) = current {
            current = candidate
                .rfind('/')
                .map(|idx| &candidate[..idx])
                .filter(|p| !p.is_empty());
            if candidate == "/" {
                root_pending = false;
            }
            return Some(candidate);
        }
        if root_pending {
            root_pending = false;
            return Some("/");
        }
        None
    })
}

/// A servlet-spec URL pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UrlPattern {
    /// `/exact/path`
    Exact(String),
    /// `/prefix/*`, stored without the `/*`; `/*` is the empty prefix.
    Prefix(String),
    /// `*.ext`, stored without the `*.`.
    Extension(String),
    /// `/`
    Default,
}

impl UrlPattern {
    pub fn parse(pattern: &str) -> Result<Self, WebError> {
        let pattern = pattern.trim();
        if pattern == "/" {
            return Ok(UrlPattern::Default);
        }
        if let Some(ext) = pattern.strip_prefix("*.") {
            if ext.is_empty() || ext.contains('/') {
                return Err(WebError::illegal_argument(format!(
                    "invalid extension pattern [{pattern}]"
                )));
            }
            return Ok(UrlPattern::Extension(ext.to_string()));
        }
        if !pattern.starts_with('/') {
            return Err(WebError::illegal_argument(format!(
                "url pattern [{pattern}] must start with a slash (/) or '*.'"
            )));
        }
        if let Some(prefix) = pattern.strip_suffix("/*") {
            if prefix.contains('*') {
                return Err(WebError::illegal_argument(format!(
                    "invalid url pattern [{pattern}]"
                )));
            }
            return Ok(UrlPattern::Prefix(prefix.to_string()));
        }
        if pattern.contains('*') {
            return Err(WebError::illegal_argument(format!(
                "invalid url pattern [{pattern}]"
            )));
        }
        Ok(UrlPattern::Exact(pattern.to_string()))
    }

    /// Whether a context-relative path matches this pattern (filter semantics).
    pub fn matches(&self, path: &str) -> bool {
        match self {
            UrlPattern::Exact(exact) => path == exact,
            UrlPattern::Prefix(prefix) => {
                prefix.is_empty()
                    || path == prefix
                    || path
                        .strip_prefix(prefix.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
            UrlPattern::Extension(ext) => extension_of(path) == Some(ext.as_str()),
            UrlPattern::Default => true,
        }
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlPattern::Exact(exact) => write!(f, "{exact}"),
            UrlPattern::Prefix(prefix) => write!(f, "{prefix}/*"),
            UrlPattern::Extension(ext) => write!(f, "*.{ext}"),
            UrlPattern::Default => write!(f, "/"),
        }
    }
}

/// Extension of the last path segment, without the dot.
pub fn extension_of(path: &str) -> Option<&str> {
    let segment = path.rsplit('/').next()?;
    let (_, ext) = segment.rsplit_once('.')?;
    Some(ext).filter(|ext| !ext.is_empty())
}
