use std::time::Duration;

use crate::store::DeletePolicy;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

#[derive(Clone, Debug)]
pub struct Configuration {
    pub github_token: String,
    pub owner: String,
    pub repo: String,
    pub api_url: String,
    pub proxy_url: Option<String>,
    pub port: u16,
    pub page_size: u32,
    pub delete_policy: DeletePolicy,
    pub cache_ttl: Duration,
}

impl Configuration {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| format!("{key} environment variable is required"))
        };

        let port = match lookup("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|e| format!("Invalid PORT value {raw:?}: {e}"))?,
            None => 3000,
        };

        let page_size = match lookup("PAGE_SIZE") {
            Some(raw) => match raw.parse::<u32>() {
                Ok(0) | Err(_) => return Err(format!("Invalid PAGE_SIZE value {raw:?}")),
                Ok(n) => n,
            },
            None => 10,
        };

        let delete_policy = match lookup("DELETE_POLICY") {
            Some(raw) => raw.parse::<DeletePolicy>()?,
            None => DeletePolicy::default(),
        };

        let cache_ttl = match lookup("CACHE_TTL_SECS") {
            Some(raw) => Duration::from_secs(
                raw.parse::<u64>()
                    .map_err(|e| format!("Invalid CACHE_TTL_SECS value {raw:?}: {e}"))?,
            ),
            None => crate::store::cache::DEFAULT_TTL,
        };

        Ok(Self {
            github_token: required("GITHUB_TOKEN")?,
            owner: required("GITHUB_OWNER")?,
            repo: required("GITHUB_REPO")?,
            api_url: lookup("GITHUB_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            proxy_url: lookup("PROXY_URL").filter(|v| !v.trim().is_empty()),
            port,
            page_size,
            delete_policy,
            cache_ttl,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn applies_defaults_when_only_required_values_are_set() {
        let config = Configuration::from_lookup(lookup_from(&[
            ("GITHUB_TOKEN", "ghp_token"),
            ("GITHUB_OWNER", "octo"),
            ("GITHUB_REPO", "hello"),
        ]))
        .expect("config should load");

        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.port, 3000);
        assert_eq!(config.page_size, 10);
        assert_eq!(config.delete_policy, DeletePolicy::Refetch);
        assert_eq!(config.cache_ttl, Duration::from_secs(120));
        assert!(config.proxy_url.is_none());
    }

    #[test]
    fn missing_token_is_reported() {
        let err = Configuration::from_lookup(lookup_from(&[
            ("GITHUB_OWNER", "octo"),
            ("GITHUB_REPO", "hello"),
        ]))
        .unwrap_err();

        assert!(err.contains("GITHUB_TOKEN"));
    }

    #[test]
    fn parses_optional_overrides() {
        let config = Configuration::from_lookup(lookup_from(&[
            ("GITHUB_TOKEN", "t"),
            ("GITHUB_OWNER", "o"),
            ("GITHUB_REPO", "r"),
            ("PORT", "8080"),
            ("PAGE_SIZE", "25"),
            ("DELETE_POLICY", "optimistic"),
            ("PROXY_URL", "http://localhost:3000"),
            ("CACHE_TTL_SECS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.page_size, 25);
        assert_eq!(config.delete_policy, DeletePolicy::Optimistic);
        assert_eq!(config.proxy_url.as_deref(), Some("http://localhost:3000"));
        assert_eq!(config.cache_ttl, Duration::from_secs(5));
    }

    #[test]
    fn rejects_zero_page_size_and_unknown_policy() {
        let base = [("GITHUB_TOKEN", "t"), ("GITHUB_OWNER", "o"), ("GITHUB_REPO", "r")];

        let mut zero = base.to_vec();
        zero.push(("PAGE_SIZE", "0"));
        assert!(Configuration::from_lookup(lookup_from(&zero)).is_err());

        let mut policy = base.to_vec();
        policy.push(("DELETE_POLICY", "sometimes"));
        assert!(Configuration::from_lookup(lookup_from(&policy)).is_err());
    }
}
