use reservation_core::{Config as CoreConfig, Error, Result};
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub sandbox: SandboxConfig,
    pub core: CoreConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub latency_ms: u64,
}

impl Config {
    /// Load from `GATEWAY_*` variables; core settings come from
    /// `GATEWAY_CORE_CONFIG` (TOML file) when set, else `RESERVATION_*`
    pub fn from_env() -> Result<Self> {
        let host = env::var("GATEWAY_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = env::var("GATEWAY_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .map_err(|e| Error::Config(format!("Invalid GATEWAY_PORT: {}", e)))?;

        let jwt_secret = env::var("GATEWAY_JWT_SECRET")
            .map_err(|_| Error::Config("GATEWAY_JWT_SECRET must be set".to_string()))?;

        let latency_ms = env::var("GATEWAY_PAYMENT_LATENCY_MS")
            .unwrap_or_else(|_| "0".to_string())
            .parse::<u64>()
            .map_err(|e| Error::Config(format!("Invalid GATEWAY_PAYMENT_LATENCY_MS: {}", e)))?;

        let core = match env::var("GATEWAY_CORE_CONFIG") {
            Ok(path) => CoreConfig::from_file(path)?,
            Err(_) => CoreConfig::from_env()?,
        };

        let config = Config {
            server: ServerConfig { host, port },
            auth: AuthConfig { jwt_secret },
            sandbox: SandboxConfig { latency_ms },
            core,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.len() < 16 {
            return Err(Error::Config(
                "GATEWAY_JWT_SECRET must be at least 16 characters".to_string(),
            ));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
