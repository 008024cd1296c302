use std::net::SocketAddr;

use courier_core::rand_id::rand_base62;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub http_addr: SocketAddr,
    /// External base URL clients sign against (scheme + host).
    pub base_url: String,
    /// Bearer token for internal task callbacks.
    pub internal_auth: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 8080).into(),
            base_url: "http://localhost:8080".to_string(),
            internal_auth: rand_base62(32),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "invalid HTTP_ADDR, using default");
            }
        }

        if let Ok(url) = std::env::var("BASE_URL") {
            if !url.is_empty() {
                config.base_url = url.trim_end_matches('/').to_string();
            }
        }

        if let Ok(token) = std::env::var("INTERNAL_AUTH") {
            if !token.is_empty() {
                config.internal_auth = token;
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert_eq!(config.internal_auth.len(), 32);
    }
}
