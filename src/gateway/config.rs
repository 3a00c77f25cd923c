use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::providers::{FireworksPath, Provider, ProviderTable};
use crate::{Error, Result};

pub const DEFAULT_LISTEN: &str = "127.0.0.1:8787";
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024 * 1024;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelayConfig {
    pub listen: String,
    pub fireworks_path: FireworksPath,
    /// Provider token to base URL overrides.
    pub upstreams: BTreeMap<String, String>,
    pub max_body_bytes: usize,
    pub request_timeout_secs: u64,
    pub json_logs: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            fireworks_path: FireworksPath::default(),
            upstreams: BTreeMap::new(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            json_logs: false,
        }
    }
}

impl RelayConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    /// Parses a `name=base_url` override as given on the command line.
    pub fn push_upstream_spec(&mut self, spec: &str) -> Result<()> {
        let (name, base_url) = spec
            .split_once('=')
            .ok_or_else(|| Error::Config(format!("invalid upstream spec: {spec}")))?;
        let name = name.trim();
        if Provider::from_token(name).is_none() {
            return Err(Error::InvalidProvider(name.to_string()));
        }
        self.upstreams
            .insert(name.to_string(), base_url.trim().to_string());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        for (name, base_url) in &self.upstreams {
            if Provider::from_token(name).is_none() {
                return Err(Error::InvalidProvider(name.clone()));
            }
            url::Url::parse(base_url)
                .map_err(|err| Error::Config(format!("invalid base url for {name}: {err}")))?;
        }
        if self.max_body_bytes == 0 {
            return Err(Error::Config("max_body_bytes must be positive".to_string()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn provider_table(&self) -> ProviderTable {
        let mut table = ProviderTable::new(self.fireworks_path);
        for (name, base_url) in &self.upstreams {
            if let Some(provider) = Provider::from_token(name) {
                table = table.with_base_url(provider, base_url);
            }
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_uses_defaults() {
        let config = RelayConfig::from_toml_str("").expect("defaults");
        assert_eq!(config, RelayConfig::default());
        assert_eq!(config.fireworks_path, FireworksPath::Inference);
    }

    #[test]
    fn parses_full_toml() {
        let config = RelayConfig::from_toml_str(
            r#"
listen = "0.0.0.0:9000"
fireworks_path = "direct"
max_body_bytes = 1024
request_timeout_secs = 30
json_logs = true

[upstreams]
openai = "http://localhost:8080"
"#,
        )
        .expect("valid config");
        assert_eq!(config.listen, "0.0.0.0:9000");
        assert_eq!(config.fireworks_path, FireworksPath::Direct);
        assert_eq!(config.max_body_bytes, 1024);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.json_logs);

        let table = config.provider_table();
        assert_eq!(
            table.route(Provider::OpenAi).upstream_base_url,
            "http://localhost:8080"
        );
        assert_eq!(
            table.route(Provider::Fireworks).endpoint_path_prefix,
            ""
        );
    }

    #[test]
    fn rejects_unknown_upstream_provider() {
        let err = RelayConfig::from_toml_str("[upstreams]\nanthropic = \"http://x\"\n").unwrap_err();
        assert!(matches!(err, Error::InvalidProvider(name) if name == "anthropic"));
    }

    #[test]
    fn rejects_invalid_base_url_and_unknown_keys() {
        assert!(matches!(
            RelayConfig::from_toml_str("[upstreams]\nopenai = \"not a url\"\n"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            RelayConfig::from_toml_str("retries = 3\n"),
            Err(Error::Toml(_))
        ));
    }

    #[test]
    fn upstream_spec_parsing() {
        let mut config = RelayConfig::default();
        config
            .push_upstream_spec("fireworks=http://127.0.0.1:1234")
            .expect("valid spec");
        assert_eq!(
            config.upstreams.get("fireworks").map(String::as_str),
            Some("http://127.0.0.1:1234")
        );
        assert!(matches!(
            config.push_upstream_spec("openai"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            config.push_upstream_spec("groq=http://x"),
            Err(Error::InvalidProvider(_))
        ));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("relay.toml");
        std::fs::write(&path, "listen = \"127.0.0.1:1\"\n").expect("write config");
        let config = RelayConfig::load(&path).expect("load");
        assert_eq!(config.listen, "127.0.0.1:1");
    }
}
