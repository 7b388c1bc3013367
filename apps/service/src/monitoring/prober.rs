use anyhow::{Result, anyhow};
use std::time::{Duration, Instant};
use url::{ParseError, Url};

/// Reachability test for a single target.
///
/// `Ok` carries the observed latency in milliseconds; any `Err` means the
/// target is considered down.
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, target: &str) -> Result<u64>;
}

/// HTTP/HTTPS prober
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self { client })
    }
}

/// Accept bare hosts such as `example.com` by assuming HTTPS
pub fn normalize_target(target: &str) -> Result<Url> {
    let target = target.trim();
    let with_https = || {
        Url::parse(&format!("https://{target}")).map_err(|e| anyhow!("Invalid URL {target:?}: {e}"))
    };
    let url = match Url::parse(target) {
        // `host:port` parses as scheme `host` with an opaque path
        Ok(url) if url.cannot_be_a_base() => with_https()?,
        Ok(url) => url,
        Err(ParseError::RelativeUrlWithoutBase) => with_https()?,
        Err(e) => return Err(anyhow!("Invalid URL {target:?}: {e}")),
    };

    if !matches!(url.scheme(), "http" | "https") {
        return Err(anyhow!("Unsupported scheme {:?} in URL {target:?}", url.scheme()));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(anyhow!("URL {target:?} has no host"));
    }
    Ok(url)
}

#[async_trait::async_trait]
impl Prober for HttpProber {
    async fn probe(&self, target: &str) -> Result<u64> {
        let url = normalize_target(target)?;
        let start = Instant::now();

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| anyhow!("HTTP request failed: {}", e))?;

        let latency = start.elapsed().as_millis() as u64;
        let status = response.status();

        // Consider 2xx and 3xx as success
        if status.is_success() || status.is_redirection() {
            Ok(latency)
        } else {
            Err(anyhow!("HTTP check failed with status code: {}", status.as_u16()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_adds_https_scheme() {
        assert_eq!(normalize_target("example.com").unwrap().as_str(), "https://example.com/");
        assert_eq!(normalize_target(" http://example.com/a ").unwrap().as_str(), "http://example.com/a");
        assert_eq!(normalize_target("example.com:8080").unwrap().as_str(), "https://example.com:8080/");
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert!(normalize_target("").is_err());
        assert!(normalize_target("https://").is_err());
        assert!(normalize_target("exa mple.com").is_err());
        assert!(normalize_target("ftp://example.com").is_err());
    }

    #[test]
    fn test_normalize_keeps_uppercase_scheme() {
        let url = normalize_target("HTTP://example.com").unwrap();
        assert_eq!(url.scheme(), "http");
        assert_eq!(url.host_str(), Some("example.com"));

        let url = normalize_target("Https://Example.com:8443/health").unwrap();
        assert_eq!(url.as_str(), "https://example.com:8443/health");
    }

    #[tokio::test]
    async fn test_unreachable_target_is_an_error() {
        let prober = HttpProber::new(Duration::from_secs(2)).unwrap();
        // Port 9 on loopback (discard) is closed on CI machines
        assert!(prober.probe("http://127.0.0.1:9").await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_target_is_an_error() {
        let prober = HttpProber::new(Duration::from_secs(2)).unwrap();
        assert!(prober.probe("not a url").await.is_err());
    }
}
