//! Request proxying for the dev server.
//!
//! The proxy table maps a context to a target:
//!
//! ```json
//! "proxyTable": {
//!   "/api": "http://localhost:3000",
//!   "/auth/**": { "target": "http://localhost:4000", "changeOrigin": true,
//!                 "pathRewrite": { "^/auth": "" } }
//! }
//! ```
//!
//! A context containing `*`, `?` or `[` is a glob matched against the request
//! path (`*` stays within one segment, `**` crosses segments). Any other
//! context is a plain string prefix, so `/api` also matches `/apix`. A
//! `filter` in the options replaces the context. Entries are tried in table
//! order and the first match wins.

use crate::error::{Error, Result};
use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, Request, Response, StatusCode};
use axum::response::IntoResponse;
use glob::{MatchOptions, Pattern};
use regex_lite::Regex;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use tracing::{debug, warn};

/// Largest request body forwarded upstream.
const MAX_BODY: usize = 64 * 1024 * 1024;

/// Headers that describe a single connection and are never forwarded.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

// ============================================================================
// Configuration
// ============================================================================

/// One proxy table value: a bare target URL or full options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProxyEntry {
    Target(String),
    Options(ProxyOptions),
}

impl ProxyEntry {
    /// Expand a bare target into options.
    #[must_use]
    pub fn normalize(self) -> ProxyOptions {
        match self {
            Self::Target(target) => ProxyOptions::new(target),
            Self::Options(options) => options,
        }
    }
}

/// Patterns used instead of the table context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextFilter {
    One(String),
    Many(Vec<String>),
}

impl ContextFilter {
    fn patterns(&self) -> Vec<&str> {
        match self {
            Self::One(p) => vec![p.as_str()],
            Self::Many(ps) => ps.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyOptions {
    pub target: String,
    /// Send the target's host in the `Host` header.
    #[serde(default)]
    pub change_origin: bool,
    /// `(regex, replacement)` pairs applied to the path in order.
    #[serde(
        default,
        deserialize_with = "ordered_entries",
        serialize_with = "serialize_entries",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub path_rewrite: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<ContextFilter>,
    /// Extra request headers sent upstream.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl ProxyOptions {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Default::default()
        }
    }
}

/// Context → entry, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyTable {
    entries: Vec<(String, ProxyEntry)>,
}

impl ProxyTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the entry for `context`.
    pub fn insert(&mut self, context: impl Into<String>, entry: ProxyEntry) {
        let context = context.into();
        match self.entries.iter_mut().find(|(c, _)| *c == context) {
            Some((_, existing)) => *existing = entry,
            None => self.entries.push((context, entry)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ProxyEntry)> {
        self.entries.iter().map(|(c, e)| (c.as_str(), e))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Normalize and compile every entry.
    pub fn rules(&self) -> Result<Vec<ProxyRule>> {
        self.entries
            .iter()
            .map(|(context, entry)| ProxyRule::new(context, entry.clone().normalize()))
            .collect()
    }
}

impl Serialize for ProxyTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serialize_entries(&self.entries, serializer)
    }
}

impl<'de> Deserialize<'de> for ProxyTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(Self {
            entries: ordered_entries(deserializer)?,
        })
    }
}

fn ordered_entries<'de, D, V>(deserializer: D) -> std::result::Result<Vec<(String, V)>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    struct EntriesVisitor<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for EntriesVisitor<V> {
        type Value = Vec<(String, V)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map")
        }

        fn visit_map<A: MapAccess<'de>>(
            self,
            mut map: A,
        ) -> std::result::Result<Self::Value, A::Error> {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(entry) = map.next_entry::<String, V>()? {
                entries.push(entry);
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(EntriesVisitor(PhantomData))
}

fn serialize_entries<S, V>(
    entries: &[(String, V)],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
    V: Serialize,
{
    serializer.collect_map(entries.iter().map(|(k, v)| (k, v)))
}

// ============================================================================
// Matching
// ============================================================================

#[derive(Debug, Clone)]
enum ContextMatcher {
    Prefix(String),
    Glob(Pattern),
}

impl ContextMatcher {
    fn parse(pattern: &str) -> std::result::Result<Self, glob::PatternError> {
        if pattern.contains(['*', '?', '[']) {
            Ok(Self::Glob(Pattern::new(pattern)?))
        } else {
            Ok(Self::Prefix(pattern.to_string()))
        }
    }

    fn matches(&self, path: &str) -> bool {
        match self {
            Self::Prefix(prefix) => path.starts_with(prefix.as_str()),
            Self::Glob(pattern) => pattern.matches_with(
                path,
                MatchOptions {
                    require_literal_separator: true,
                    ..MatchOptions::new()
                },
            ),
        }
    }
}

/// A normalized, compiled proxy table entry.
#[derive(Debug, Clone)]
pub struct ProxyRule {
    context: String,
    matchers: Vec<ContextMatcher>,
    rewrites: Vec<(Regex, String)>,
    target: reqwest::Url,
    options: ProxyOptions,
}

impl ProxyRule {
    pub fn new(context: &str, options: ProxyOptions) -> Result<Self> {
        let invalid = |message: String| Error::Proxy {
            context: context.to_string(),
            message,
        };

        let patterns = match &options.filter {
            Some(filter) => filter.patterns(),
            None => vec![context],
        };
        let matchers = patterns
            .into_iter()
            .map(|p| {
                ContextMatcher::parse(p).map_err(|e| invalid(format!("bad pattern {p:?}: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        let rewrites = options
            .path_rewrite
            .iter()
            .map(|(from, to)| {
                Regex::new(from)
                    .map(|re| (re, to.clone()))
                    .map_err(|e| invalid(format!("bad pathRewrite {from:?}: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        let target = reqwest::Url::parse(&options.target)
            .map_err(|e| invalid(format!("bad target {:?}: {e}", options.target)))?;

        Ok(Self {
            context: context.to_string(),
            matchers,
            rewrites,
            target,
            options,
        })
    }

    #[must_use]
    pub fn context(&self) -> &str {
        &self.context
    }

    #[must_use]
    pub fn options(&self) -> &ProxyOptions {
        &self.options
    }

    /// Whether the request path (without query) belongs to this rule.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        self.matchers.iter().any(|m| m.matches(path))
    }

    /// Apply `pathRewrite` in order.
    #[must_use]
    pub fn rewrite_path(&self, path: &str) -> String {
        self.rewrites
            .iter()
            .fold(path.to_string(), |path, (re, to)| {
                re.replace(&path, to.as_str()).into_owned()
            })
    }

    /// Upstream URL for a request path and optional query.
    pub fn upstream_url(&self, path: &str, query: Option<&str>) -> Result<reqwest::Url> {
        let base = self.target.as_str().trim_end_matches('/');
        let rewritten = self.rewrite_path(path);
        let sep = if rewritten.starts_with('/') || rewritten.is_empty() {
            ""
        } else {
            "/"
        };
        let mut url = format!("{base}{sep}{rewritten}");
        if let Some(query) = query {
            url.push('?');
            url.push_str(query);
        }
        reqwest::Url::parse(&url).map_err(|e| Error::Proxy {
            context: self.context.clone(),
            message: format!("bad upstream url {url:?}: {e}"),
        })
    }
}

/// First rule matching `path`.
pub fn match_rule<'a>(rules: &'a [ProxyRule], path: &str) -> Option<&'a ProxyRule> {
    rules.iter().find(|r| r.matches(path))
}

// ============================================================================
// Forwarding
// ============================================================================

/// HTTP client for forwarding: no redirects followed, bodies passed through.
pub fn client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_gzip()
        .build()
        .map_err(|e| Error::other(format!("cannot build proxy client: {e}")))
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

fn forwarded_headers(source: &HeaderMap, rule: &ProxyRule) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(source.len());
    for (name, value) in source {
        if is_hop_by_hop(name) || *name == header::CONTENT_LENGTH {
            continue;
        }
        if *name == header::HOST && rule.options.change_origin {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    for (name, value) in &rule.options.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            value.parse::<header::HeaderValue>(),
        ) {
            headers.insert(name, value);
        }
    }
    headers
}

fn bad_gateway(message: String) -> Response<Body> {
    (StatusCode::BAD_GATEWAY, message).into_response()
}

/// Forward `req` to the rule's target and relay the response.
///
/// Any upstream failure becomes `502 Bad Gateway`.
pub async fn forward(
    client: &reqwest::Client,
    rule: &ProxyRule,
    req: Request<Body>,
) -> Response<Body> {
    let (parts, body) = req.into_parts();

    let url = match rule.upstream_url(parts.uri.path(), parts.uri.query()) {
        Ok(url) => url,
        Err(e) => return bad_gateway(e.to_string()),
    };
    let body = match axum::body::to_bytes(body, MAX_BODY).await {
        Ok(body) => body,
        Err(e) => return bad_gateway(format!("cannot read request body: {e}")),
    };

    debug!(method = %parts.method, from = %parts.uri, to = %url, "proxying");

    let upstream = client
        .request(parts.method, url.clone())
        .headers(forwarded_headers(&parts.headers, rule))
        .body(body)
        .send()
        .await;

    let upstream = match upstream {
        Ok(resp) => resp,
        Err(e) => {
            warn!(target_url = %url, error = %e, "proxy upstream failed");
            return bad_gateway(format!("proxy error: {e}"));
        }
    };

    let status = upstream.status();
    let mut headers = HeaderMap::with_capacity(upstream.headers().len());
    for (name, value) in upstream.headers() {
        if !is_hop_by_hop(name) && *name != header::CONTENT_LENGTH {
            headers.append(name.clone(), value.clone());
        }
    }

    match upstream.bytes().await {
        Ok(bytes) => {
            let mut response = Response::new(Body::from(bytes));
            *response.status_mut() = status;
            *response.headers_mut() = headers;
            response
        }
        Err(e) => bad_gateway(format!("proxy error: {e}")),
    }
}
