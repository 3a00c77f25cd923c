//! Provider routing: maps the first path segment of an incoming request to
//! an upstream base URL and composes the full upstream URL.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::GatewayError;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const FIREWORKS_BASE_URL: &str = "https://api.fireworks.ai";

const FIREWORKS_INFERENCE_PREFIX: &str = "/inference";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Provider {
    OpenAi,
    Fireworks,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::OpenAi, Provider::Fireworks];

    /// Exact, case-sensitive match on the path token.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "openai" => Some(Self::OpenAi),
            "fireworks" => Some(Self::Fireworks),
            _ => None,
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Fireworks => "fireworks",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::OpenAi => OPENAI_BASE_URL,
            Self::Fireworks => FIREWORKS_BASE_URL,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// How the Fireworks endpoint path is composed. `Inference` inserts
/// `/inference` between the base URL and the forwarded path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FireworksPath {
    #[default]
    Inference,
    Direct,
}

impl std::str::FromStr for FireworksPath {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "inference" => Ok(Self::Inference),
            "direct" => Ok(Self::Direct),
            other => Err(format!(
                "invalid fireworks path policy: {other} (expected inference or direct)"
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderRoute {
    pub provider: Provider,
    pub upstream_base_url: String,
    pub endpoint_path_prefix: &'static str,
}

impl ProviderRoute {
    fn new(provider: Provider, base_url: &str, fireworks_path: FireworksPath) -> Self {
        let endpoint_path_prefix = match (provider, fireworks_path) {
            (Provider::Fireworks, FireworksPath::Inference) => FIREWORKS_INFERENCE_PREFIX,
            _ => "",
        };
        Self {
            provider,
            upstream_base_url: base_url.trim_end_matches('/').to_string(),
            endpoint_path_prefix,
        }
    }

    /// `endpoint_path` must start with `/`. The query is appended verbatim.
    pub fn upstream_url(&self, endpoint_path: &str, query: Option<&str>) -> String {
        let mut out = String::with_capacity(
            self.upstream_base_url.len()
                + self.endpoint_path_prefix.len()
                + endpoint_path.len()
                + query.map_or(0, |query| query.len() + 1),
        );
        out.push_str(&self.upstream_base_url);
        out.push_str(self.endpoint_path_prefix);
        out.push_str(endpoint_path);
        if let Some(query) = query.filter(|query| !query.is_empty()) {
            out.push('?');
            out.push_str(query);
        }
        out
    }
}

/// A resolved request target: which provider and the full upstream URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpstreamTarget {
    pub provider: Provider,
    pub url: String,
    path_len: usize,
}

impl UpstreamTarget {
    /// The upstream URL up to, not including, the query.
    pub fn url_without_query(&self) -> &str {
        &self.url[..self.path_len]
    }
}

/// The fixed route table. Built once at startup and shared read-only.
#[derive(Clone, Debug)]
pub struct ProviderTable {
    openai: ProviderRoute,
    fireworks: ProviderRoute,
}

impl Default for ProviderTable {
    fn default() -> Self {
        Self::new(FireworksPath::default())
    }
}

impl ProviderTable {
    pub fn new(fireworks_path: FireworksPath) -> Self {
        Self {
            openai: ProviderRoute::new(Provider::OpenAi, OPENAI_BASE_URL, fireworks_path),
            fireworks: ProviderRoute::new(Provider::Fireworks, FIREWORKS_BASE_URL, fireworks_path),
        }
    }

    pub fn with_base_url(mut self, provider: Provider, base_url: &str) -> Self {
        let route = match provider {
            Provider::OpenAi => &mut self.openai,
            Provider::Fireworks => &mut self.fireworks,
        };
        route.upstream_base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn route(&self, provider: Provider) -> &ProviderRoute {
        match provider {
            Provider::OpenAi => &self.openai,
            Provider::Fireworks => &self.fireworks,
        }
    }

    pub fn resolve(&self, token: &str) -> Result<&ProviderRoute, GatewayError> {
        Provider::from_token(token)
            .map(|provider| self.route(provider))
            .ok_or_else(|| GatewayError::UnsupportedProvider {
                token: token.to_string(),
            })
    }

    /// Resolves `/{provider}/{...endpoint}` plus an optional query into the
    /// upstream URL. Empty path segments are dropped.
    pub fn resolve_path(
        &self,
        path: &str,
        query: Option<&str>,
    ) -> Result<UpstreamTarget, GatewayError> {
        let mut segments = path.split('/').filter(|segment| !segment.is_empty());
        let token = segments.next().unwrap_or_default();
        let route = self.resolve(token)?;

        let mut endpoint_path = String::with_capacity(path.len());
        endpoint_path.push('/');
        for (idx, segment) in segments.enumerate() {
            if idx > 0 {
                endpoint_path.push('/');
            }
            endpoint_path.push_str(segment);
        }

        let path_len = route.upstream_base_url.len()
            + route.endpoint_path_prefix.len()
            + endpoint_path.len();
        Ok(UpstreamTarget {
            provider: route.provider,
            url: route.upstream_url(&endpoint_path, query),
            path_len,
        })
    }
}
