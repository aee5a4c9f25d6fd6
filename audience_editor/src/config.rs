//! src/config.rs
use std::{net::SocketAddr, time::Duration};

use anyhow::{Context, Result};
use url::Url;

use crate::model::Group;

const DEFAULT_API_URL: &str = "http://localhost:5000";
const DEFAULT_BIND: &str = "0.0.0.0:3000";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the persistence backend.
    pub api_url:       Url,
    /// Where the control API listens.
    pub bind:          SocketAddr,
    pub default_group: Group,
    pub http_timeout:  Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_url = get("AUDIENCE_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into());
        let api_url = Url::parse(&api_url)
            .with_context(|| format!("AUDIENCE_API_URL is not a URL: {api_url}"))?;
        if api_url.cannot_be_a_base() {
            anyhow::bail!("AUDIENCE_API_URL cannot carry a path: {api_url}");
        }

        let bind = get("AUDIENCE_BIND").unwrap_or_else(|| DEFAULT_BIND.into());
        let bind = bind
            .parse::<SocketAddr>()
            .with_context(|| format!("AUDIENCE_BIND is not a socket address: {bind}"))?;

        let default_group = match get("AUDIENCE_DEFAULT_GROUP") {
            Some(g) => g.parse::<Group>().context("AUDIENCE_DEFAULT_GROUP")?,
            None    => Group::default(),
        };

        let http_timeout = match get("AUDIENCE_HTTP_TIMEOUT_SECS") {
            Some(s) => s
                .parse::<u64>()
                .with_context(|| format!("AUDIENCE_HTTP_TIMEOUT_SECS is not a number: {s}"))?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            api_url,
            bind,
            default_group,
            http_timeout: Duration::from_secs(http_timeout),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.api_url.as_str(), "http://localhost:5000/");
        assert_eq!(cfg.bind, "0.0.0.0:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.default_group, Group::New);
        assert_eq!(cfg.http_timeout, Duration::from_secs(10));
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = Config::from_lookup(lookup(&[
            ("AUDIENCE_API_URL", "https://mailer.example.org/backend/"),
            ("AUDIENCE_BIND", "127.0.0.1:8080"),
            ("AUDIENCE_DEFAULT_GROUP", "none"),
            ("AUDIENCE_HTTP_TIMEOUT_SECS", "3"),
        ]))
        .unwrap();

        assert_eq!(cfg.api_url.path(), "/backend/");
        assert_eq!(cfg.bind.port(), 8080);
        assert_eq!(cfg.default_group, Group::None);
        assert_eq!(cfg.http_timeout, Duration::from_secs(3));
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(Config::from_lookup(lookup(&[("AUDIENCE_API_URL", "::")])).is_err());
        assert!(Config::from_lookup(lookup(&[("AUDIENCE_API_URL", "mailto:a@x.com")])).is_err());
        assert!(Config::from_lookup(lookup(&[("AUDIENCE_BIND", "port 80")])).is_err());
        assert!(Config::from_lookup(lookup(&[("AUDIENCE_DEFAULT_GROUP", "vip")])).is_err());
        assert!(Config::from_lookup(lookup(&[("AUDIENCE_HTTP_TIMEOUT_SECS", "soon")])).is_err());
    }
}
