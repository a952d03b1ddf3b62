use url::Url;

use crate::error::EndpointError;

/// Path of the all-matches stream on the match server.
pub const DEFAULT_STREAM_PATH: &str = "/api/ws/matches";

/// Where the stream lives: the host the app was served from, whether that
/// origin was secure, and the fixed stream path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    secure: bool,
    path: String,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, secure: bool) -> Self {
        Self {
            host: host.into(),
            secure,
            path: DEFAULT_STREAM_PATH.to_string(),
        }
    }

    /// Resolves the stream endpoint from the hosting origin. `https`/`wss`
    /// origins yield `wss`, `http`/`ws` yield `ws`. A bare `host[:port]` is
    /// plain only when the host is exactly a loopback name, secure otherwise.
    /// Origins carrying a path are rejected.
    pub fn from_origin(origin: &str) -> Result<Self, EndpointError> {
        let origin = origin.trim();
        if origin.trim_end_matches('/').is_empty() {
            return Err(EndpointError::MissingHost);
        }

        let (url, secure) = if origin.contains("://") {
            let url = Url::parse(origin)?;
            let secure = match url.scheme() {
                "https" | "wss" => true,
                "http" | "ws" => false,
                other => return Err(EndpointError::UnsupportedScheme(other.to_string())),
            };
            (url, secure)
        } else {
            let origin = origin.trim_end_matches('/');
            let plain = Url::parse(&format!("http://{origin}"))?;
            if plain.host_str().is_some_and(is_loopback) {
                (plain, false)
            } else {
                // Reparsed so an explicit :443 folds away and :80 survives.
                (Url::parse(&format!("https://{origin}"))?, true)
            }
        };

        if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
            return Err(EndpointError::UnexpectedPath(origin.to_string()));
        }
        let host = url.host_str().ok_or(EndpointError::MissingHost)?;
        let host = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        Ok(Self::new(host, secure))
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.path = if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// `https://host` or `http://host`, matching the stream's security. The
    /// REST API lives under this origin.
    pub fn http_origin(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{scheme}://{}", self.host)
    }

    /// Full websocket URL. `localhost` is pinned to IPv4 so resolvers that
    /// prefer `::1` do not miss a server bound to `127.0.0.1`.
    pub fn url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        let host = if self.host == "localhost" || self.host.starts_with("localhost:") {
            self.host.replacen("localhost", "127.0.0.1", 1)
        } else {
            self.host.clone()
        };
        format!("{scheme}://{host}{}", self.path)
    }
}

fn is_loopback(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "[::1]")
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new("localhost:8000", false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_follows_origin_security() {
        let secure = Endpoint::from_origin("https://scores.example.com").unwrap();
        assert_eq!(secure.url(), "wss://scores.example.com/api/ws/matches");

        let plain = Endpoint::from_origin("http://scores.example.com:8080/").unwrap();
        assert_eq!(plain.url(), "ws://scores.example.com:8080/api/ws/matches");
    }

    #[test]
    fn bare_hosts_are_auto_detected() {
        assert!(!Endpoint::from_origin("localhost:8000").unwrap().is_secure());
        assert!(!Endpoint::from_origin("127.0.0.1:9000").unwrap().is_secure());
        assert!(!Endpoint::from_origin("[::1]:8000").unwrap().is_secure());
        assert!(Endpoint::from_origin("scores.example.com").unwrap().is_secure());

        // Loopback names inside a public host do not make it plain.
        for origin in [
            "localhost.scores.example.com",
            "my127.0.0.1.example.com",
            "scores-localhost.example.com:8443",
        ] {
            let endpoint = Endpoint::from_origin(origin).unwrap();
            assert!(endpoint.is_secure(), "{origin}");
            assert!(endpoint.url().starts_with("wss://"), "{origin}");
        }
    }

    #[test]
    fn bare_hosts_keep_non_default_ports() {
        let endpoint = Endpoint::from_origin("scores.example.com:80").unwrap();
        assert_eq!(endpoint.url(), "wss://scores.example.com:80/api/ws/matches");
        let endpoint = Endpoint::from_origin("scores.example.com:443").unwrap();
        assert_eq!(endpoint.url(), "wss://scores.example.com/api/ws/matches");
    }

    #[test]
    fn origins_with_a_path_are_rejected() {
        for origin in [
            "scores.example.com/app",
            "https://scores.example.com/app",
            "localhost:8000/api",
            "https://scores.example.com/?debug=1",
        ] {
            assert!(
                matches!(
                    Endpoint::from_origin(origin),
                    Err(EndpointError::UnexpectedPath(_))
                ),
                "{origin}"
            );
        }
    }

    #[test]
    fn http_origin_follows_the_stream_security() {
        let secure = Endpoint::from_origin("scores.example.com").unwrap();
        assert_eq!(secure.http_origin(), "https://scores.example.com");
        let plain = Endpoint::from_origin("localhost:8000").unwrap();
        assert_eq!(plain.http_origin(), "http://localhost:8000");
    }

    #[test]
    fn localhost_is_pinned_to_ipv4() {
        let endpoint = Endpoint::from_origin("http://localhost:8000").unwrap();
        assert_eq!(endpoint.host(), "localhost:8000");
        assert_eq!(endpoint.url(), "ws://127.0.0.1:8000/api/ws/matches");
    }

    #[test]
    fn custom_path_is_rooted() {
        let endpoint = Endpoint::new("example.com", true).with_path("stream/v2");
        assert_eq!(endpoint.url(), "wss://example.com/stream/v2");
    }

    #[test]
    fn bad_origins_are_rejected() {
        assert!(matches!(
            Endpoint::from_origin("ftp://example.com"),
            Err(EndpointError::UnsupportedScheme(s)) if s == "ftp"
        ));
        assert!(matches!(
            Endpoint::from_origin(""),
            Err(EndpointError::MissingHost)
        ));
        assert!(matches!(
            Endpoint::from_origin("http://"),
            Err(EndpointError::InvalidUrl(_))
        ));
    }
}
