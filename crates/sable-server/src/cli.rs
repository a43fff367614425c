//! Command-line and environment configuration

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use clap::Parser;
use sable_auth::config::{
    ENV_JWKS_URL, ENV_JWT_SECRET, ENV_PROJECT_URL, ENV_PUBLIC_JWKS_URL,
};
use sable_auth::{AuthSettings, ConfigError};

/// Sable backend API server
///
/// Every option can also be set through the environment variable named in
/// its help text.
#[derive(Parser, Debug, Clone)]
#[command(name = "sable-server", version, about)]
pub struct Cli {
    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: u16,

    /// Address to bind
    #[arg(long, env = "BIND_ADDRESS", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,

    /// JWKS endpoint of the identity provider
    #[arg(long, env = ENV_JWKS_URL)]
    pub jwks_url: Option<String>,

    /// JWKS endpoint shared with the web frontend (used when --jwks-url is unset)
    #[arg(long, env = ENV_PUBLIC_JWKS_URL, hide = true)]
    pub public_jwks_url: Option<String>,

    /// Supabase project URL; the JWKS URL is derived from it when not given
    #[arg(long, env = ENV_PROJECT_URL)]
    pub supabase_url: Option<String>,

    /// Shared secret for HS256 tokens (HS256 is refused when empty)
    #[arg(long, env = ENV_JWT_SECRET, hide_env_values = true, default_value = "")]
    pub jwt_secret: String,

    /// Seconds a fetched key set stays valid
    #[arg(long, env = "JWKS_CACHE_TTL_SECS", default_value_t = 600)]
    pub jwks_cache_ttl_secs: u64,

    /// Timeout in seconds for one JWKS request
    #[arg(long, env = "JWKS_FETCH_TIMEOUT_SECS", default_value_t = 10)]
    pub jwks_fetch_timeout_secs: u64,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Socket address to listen on
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    /// Token verification settings
    ///
    /// # Errors
    ///
    /// Fails when no JWKS URL can be resolved or the resolved URL is invalid.
    pub fn auth_settings(&self) -> Result<AuthSettings, ConfigError> {
        Ok(AuthSettings::resolve(
            self.jwks_url.as_deref(),
            self.public_jwks_url.as_deref(),
            self.supabase_url.as_deref(),
        )?
        .with_jwt_secret(self.jwt_secret.clone())
        .with_cache_ttl(Duration::from_secs(self.jwks_cache_ttl_secs))
        .with_fetch_timeout(Duration::from_secs(self.jwks_fetch_timeout_secs)))
    }
}
