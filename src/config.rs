use std::env;

use crate::utils::error::{AppError, AppResult};

const DEFAULT_CORS_ORIGINS: &str =
    "http://localhost:5173,http://localhost:3000,http://127.0.0.1:5173,http://127.0.0.1:3000";

/// Runtime configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub mongodb_uri: String,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub scraper_api_key: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests don't touch the process env.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| AppError::Internal(format!("{} must be set", key)))
        };
        let or_default = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| {
                    log::info!("{} not set, using default: {}", key, default);
                    default.to_string()
                })
        };

        let port = or_default("PORT", "3000")
            .parse::<u16>()
            .map_err(|e| AppError::Internal(format!("Invalid PORT value: {}", e)))?;

        let cors_origins = or_default("CORS_ORIGINS", DEFAULT_CORS_ORIGINS)
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        Ok(Self {
            host: or_default("HOST", "0.0.0.0"),
            port,
            mongodb_uri: required("MONGODB_URI")?,
            jwt_secret: required("JWT_SECRET")?,
            jwt_issuer: or_default("JWT_ISSUER", "finanzas-service"),
            jwt_audience: or_default("JWT_AUDIENCE", "finanzas-app"),
            scraper_api_key: required("SCRAPER_API_KEY")?,
            openai_api_key: lookup("OPENAI_API_KEY").filter(|v| !v.trim().is_empty()),
            openai_model: or_default("OPENAI_MODEL", "gpt-3.5-turbo"),
            openai_base_url: or_default("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            cors_origins,
        })
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        host: "127.0.0.1".into(),
        port: 3000,
        mongodb_uri: "mongodb://localhost:27017/finanzas_test".into(),
        jwt_secret: "test-secret".into(),
        jwt_issuer: "finanzas-service".into(),
        jwt_audience: "finanzas-app".into(),
        scraper_api_key: "scraper-key".into(),
        openai_api_key: None,
        openai_model: "gpt-3.5-turbo".into(),
        openai_base_url: "https://api.openai.com/v1".into(),
        cors_origins: vec!["http://localhost:5173".into()],
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
    fn test_defaults_applied() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("MONGODB_URI", "mongodb://localhost:27017/finanzas"),
            ("JWT_SECRET", "s3cret"),
            ("SCRAPER_API_KEY", "key"),
        ]))
        .unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.openai_api_key, None);
        assert_eq!(config.openai_model, "gpt-3.5-turbo");
        assert_eq!(config.cors_origins.len(), 4);
    }

    #[test]
    fn test_missing_secret_is_an_error() {
        let result = AppConfig::from_lookup(lookup_from(&[
            ("MONGODB_URI", "mongodb://localhost:27017/finanzas"),
            ("SCRAPER_API_KEY", "key"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_blank_openai_key_means_disabled() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("MONGODB_URI", "mongodb://localhost:27017/finanzas"),
            ("JWT_SECRET", "s3cret"),
            ("SCRAPER_API_KEY", "key"),
            ("OPENAI_API_KEY", "  "),
            ("CORS_ORIGINS", "https://app.example.cl, https://www.example.cl"),
        ]))
        .unwrap();

        assert!(config.openai_api_key.is_none());
        assert_eq!(config.cors_origins, vec!["https://app.example.cl", "https://www.example.cl"]);
    }

    #[test]
    fn test_invalid_port_rejected() {
        let result = AppConfig::from_lookup(lookup_from(&[
            ("MONGODB_URI", "mongodb://localhost:27017/finanzas"),
            ("JWT_SECRET", "s3cret"),
            ("SCRAPER_API_KEY", "key"),
            ("PORT", "not-a-port"),
        ]));
        assert!(result.is_err());
    }
}
