use reqwest::{Client, ClientBuilder};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;
use crate::error::DruglinkError;

/// An HTTP client that only allows requests to approved domains.
/// The normalization services are the only network collaborators of a run.
#[derive(Debug, Clone)]
pub struct SandboxClient {
    client: Client,
    allowlist: HashSet<String>,
}

impl SandboxClient {
    /// Creates a new SandboxClient with the default allowlist of Translator services.
    pub fn new() -> Result<Self, DruglinkError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, DruglinkError> {
        let mut allowlist = HashSet::new();
        let domains = vec![
            "nodenormalization-sri.renci.org", // Node Normalization (RENCI)
            "name-resolution-sri.renci.org",   // Name Resolution (RENCI)
            "nodenorm.transltr.io",            // Node Normalization (ITRB)
            "name-lookup.transltr.io",         // Name Resolution (ITRB)
            "localhost",                       // Self-hosted instances
            "127.0.0.1",                       // Localhost alt
        ];

        for d in domains {
            allowlist.insert(d.to_string());
        }

        let client = ClientBuilder::new()
            .timeout(timeout)
            .build()
            .map_err(|e| DruglinkError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, allowlist })
    }

    /// Allow the host of a configured base URL.
    pub fn allow_url_host(&mut self, url: &str) {
        if let Some(host) = Url::parse(url).ok().and_then(|u| u.host_str().map(String::from)) {
            self.allowlist.insert(host);
        }
    }

    /// Validates if a URL is permitted under the current sandbox policy.
    pub fn is_allowed(&self, url: &str) -> bool {
        if let Ok(parsed) = Url::parse(url) {
            if let Some(host) = parsed.host_str() {
                // Check exact match or if it's a subdomain of an allowed domain
                for allowed in &self.allowlist {
                    if host == allowed || host.ends_with(&format!(".{}", allowed)) {
                        return true;
                    }
                }
            }
        }
        false
    }

    fn check(&self, url: &str) -> Result<(), DruglinkError> {
        if self.is_allowed(url) {
            Ok(())
        } else {
            Err(DruglinkError::Security(format!(
                "domain not in allowlist for URL {}",
                url
            )))
        }
    }

    pub fn get(&self, url: &str) -> Result<reqwest::RequestBuilder, DruglinkError> {
        self.check(url)?;
        Ok(self.client.get(url))
    }

    pub fn post(&self, url: &str) -> Result<reqwest::RequestBuilder, DruglinkError> {
        self.check(url)?;
        Ok(self.client.post(url))
    }
}
