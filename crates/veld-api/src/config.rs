//! API server configuration.

use std::net::SocketAddr;
use std::time::Duration;

/// Settings for the HTTP server.
#[derive(Clone)]
pub struct ApiConfig {
    /// Listen address.
    pub bind_addr: SocketAddr,
    /// HS256 secret for issued tokens.
    pub jwt_secret: String,
    /// Token lifetime.
    pub token_ttl: Duration,
}

impl ApiConfig {
    /// Default lifetime of issued tokens.
    pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

    /// Creates a config with the default port and token lifetime.
    #[must_use]
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 7000)),
            jwt_secret: jwt_secret.into(),
            token_ttl: Self::DEFAULT_TOKEN_TTL,
        }
    }

    /// Overrides the listen address.
    #[must_use]
    pub fn with_bind_addr(mut self, bind_addr: SocketAddr) -> Self {
        self.bind_addr = bind_addr;
        self
    }

    /// The local test profile.
    #[must_use]
    pub fn for_tests() -> Self {
        Self::new("default-secret-key-for-testing")
            .with_bind_addr(SocketAddr::from(([127, 0, 0, 1], 0)))
    }
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("jwt_secret", &"[REDACTED]")
            .field("token_ttl", &self.token_ttl)
            .finish()
    }
}
