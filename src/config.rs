use anyhow::{Context, Result};

/// Application configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // ── Server ──────────────────────────────────────────────────────────
    pub host: String,
    pub port: u16,

    // ── Domo ────────────────────────────────────────────────────────────
    pub client_id: String,
    pub client_secret: String,
    /// Public API base, e.g. `https://api.domo.com`.
    pub api_base: String,
    /// Customer instance URL used to build embed links.
    pub instance_url: String,
    /// Scope requested on the client-credentials grant.
    pub token_scope: String,
}

pub const DEFAULT_API_BASE: &str = "https://api.domo.com";
pub const DEFAULT_INSTANCE_URL: &str = "https://your-instance.domo.com";
pub const DEFAULT_TOKEN_SCOPE: &str = "data dashboard user";

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "5000".into())
                .parse()
                .context("Invalid PORT")?,

            client_id: std::env::var("DOMO_CLIENT_ID")
                .context("DOMO_CLIENT_ID is required")?,
            client_secret: std::env::var("DOMO_CLIENT_SECRET")
                .context("DOMO_CLIENT_SECRET is required")?,
            api_base: trim_url(
                std::env::var("DOMO_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.into()),
            ),
            instance_url: trim_url(
                std::env::var("DOMO_INSTANCE").unwrap_or_else(|_| DEFAULT_INSTANCE_URL.into()),
            ),
            token_scope: std::env::var("DOMO_TOKEN_SCOPE")
                .unwrap_or_else(|_| DEFAULT_TOKEN_SCOPE.into()),
        })
    }

    /// Build a config for tests and embedding, with default URLs.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Config {
            host: "127.0.0.1".into(),
            port: 5000,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            api_base: DEFAULT_API_BASE.into(),
            instance_url: DEFAULT_INSTANCE_URL.into(),
            token_scope: DEFAULT_TOKEN_SCOPE.into(),
        }
    }

    /// Embed link for a card on the configured instance.
    pub fn embed_url(&self, card_id: &str) -> String {
        format!("{}/embed/card/private/{}", self.instance_url, card_id)
    }
}

fn trim_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embed_url_uses_instance() {
        let mut config = Config::new("id", "secret");
        config.instance_url = trim_url("https://acme.domo.com/".into());
        assert_eq!(
            config.embed_url("card-9"),
            "https://acme.domo.com/embed/card/private/card-9"
        );
    }

    #[test]
    fn test_defaults() {
        let config = Config::new("id", "secret");
        assert_eq!(config.api_base, "https://api.domo.com");
        assert_eq!(config.token_scope, "data dashboard user");
    }
}
