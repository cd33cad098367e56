//! Server configuration

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Listener settings
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            bind_addr: lookup("BIND_ADDR")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_addr() {
        assert_eq!(ServerConfig::from_lookup(|_| None).bind_addr, DEFAULT_BIND_ADDR);

        let config = ServerConfig::from_lookup(|key| (key == "BIND_ADDR").then(|| "127.0.0.1:8080".into()));
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
    }
}
