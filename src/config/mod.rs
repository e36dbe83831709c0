use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub filter: FilterConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub workflow: WorkflowConfig,
    pub billing: BillingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub max_limit: Option<i32>,
    pub debug_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres connection string. When absent outside production the
    /// server falls back to the in-memory store.
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub enable_query_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub cors_origins: Vec<String>,
    pub jwt_secret: String,
    pub jwt_refresh_secret: String,
    pub jwt_expiry_minutes: i64,
    pub jwt_refresh_expiry_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub host: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    pub trial_plan_slug: String,
    pub trial_days: i64,
}

fn default_cors_origins() -> Vec<String> {
    [
        "http://localhost:3000",
        "http://localhost:3001",
        "http://localhost:3002",
        "http://localhost:3003",
        "https://moovelabs.com",
        "https://www.moovelabs.com",
        "https://app.moovelabs.com",
        "https://api.moovelabs.com",
        "https://painel.moovelabs.com",
        "https://painel-n8n.moovelabs.com",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Filter overrides
        if let Ok(v) = env::var("FILTER_MAX_LIMIT") {
            self.filter.max_limit = v.parse().ok();
        }
        if let Ok(v) = env::var("FILTER_DEBUG_LOGGING") {
            self.filter.debug_logging = v.parse().unwrap_or(self.filter.debug_logging);
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            if !v.trim().is_empty() {
                self.database.url = Some(v);
            }
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_ENABLE_QUERY_LOGGING") {
            self.database.enable_query_logging = v.parse().unwrap_or(self.database.enable_query_logging);
        }

        // API overrides
        if let Some(port) = env::var("PORT")
            .ok()
            .or_else(|| env::var("BACKEND_PORT").ok())
            .and_then(|s| s.parse::<u16>().ok())
        {
            self.api.port = port;
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("JWT_REFRESH_SECRET") {
            self.security.jwt_refresh_secret = v;
        }
        if let Ok(v) = env::var("JWT_EXPIRY_MINUTES") {
            self.security.jwt_expiry_minutes = v.parse().unwrap_or(self.security.jwt_expiry_minutes);
        }
        if let Ok(v) = env::var("JWT_REFRESH_EXPIRY_DAYS") {
            self.security.jwt_refresh_expiry_days = v.parse().unwrap_or(self.security.jwt_refresh_expiry_days);
        }

        // Workflow engine overrides
        if let Ok(v) = env::var("N8N_HOST") {
            self.workflow.host = v.trim_end_matches('/').to_string();
        }
        if let Ok(v) = env::var("N8N_API_KEY") {
            self.workflow.api_key = v;
        }

        // Billing overrides
        if let Ok(v) = env::var("TRIAL_PLAN_SLUG") {
            self.billing.trial_plan_slug = v;
        }
        if let Ok(v) = env::var("TRIAL_DAYS") {
            self.billing.trial_days = v.parse().unwrap_or(self.billing.trial_days);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            filter: FilterConfig {
                max_limit: Some(1000),
                debug_logging: true,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
                enable_query_logging: true,
            },
            api: ApiConfig {
                port: 3002,
                enable_request_logging: true,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
            },
            security: SecurityConfig {
                cors_origins: default_cors_origins(),
                jwt_secret: "moovelabs-dev-access-secret".to_string(),
                jwt_refresh_secret: "moovelabs-dev-refresh-secret".to_string(),
                jwt_expiry_minutes: 24 * 60,
                jwt_refresh_expiry_days: 7,
            },
            workflow: WorkflowConfig {
                host: "http://localhost:5678".to_string(),
                api_key: String::new(),
            },
            billing: BillingConfig {
                trial_plan_slug: "start".to_string(),
                trial_days: 14,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            filter: FilterConfig {
                max_limit: Some(500),
                debug_logging: false,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 10,
                enable_query_logging: true,
            },
            api: ApiConfig {
                port: 3002,
                enable_request_logging: true,
                max_request_size_bytes: 5 * 1024 * 1024, // 5MB
            },
            security: SecurityConfig {
                cors_origins: default_cors_origins(),
                jwt_secret: String::new(),
                jwt_refresh_secret: String::new(),
                jwt_expiry_minutes: 60,
                jwt_refresh_expiry_days: 7,
            },
            workflow: WorkflowConfig {
                host: "http://localhost:5678".to_string(),
                api_key: String::new(),
            },
            billing: BillingConfig {
                trial_plan_slug: "start".to_string(),
                trial_days: 14,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            filter: FilterConfig {
                max_limit: Some(100),
                debug_logging: false,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
                enable_query_logging: false,
            },
            api: ApiConfig {
                port: 3002,
                enable_request_logging: false,
                max_request_size_bytes: 2 * 1024 * 1024, // 2MB
            },
            security: SecurityConfig {
                cors_origins: default_cors_origins(),
                jwt_secret: String::new(),
                jwt_refresh_secret: String::new(),
                jwt_expiry_minutes: 15,
                jwt_refresh_expiry_days: 7,
            },
            workflow: WorkflowConfig {
                host: "https://painel-n8n.moovelabs.com".to_string(),
                api_key: String::new(),
            },
            billing: BillingConfig {
                trial_plan_slug: "start".to_string(),
                trial_days: 14,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.filter.max_limit, Some(1000));
        assert!(!config.security.jwt_secret.is_empty());
        assert_eq!(config.billing.trial_plan_slug, "start");
        assert!(config.database.url.is_none());
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert_eq!(config.filter.max_limit, Some(100));
        // Production secrets must come from the environment
        assert!(config.security.jwt_secret.is_empty());
        assert!(config.security.cors_origins.contains(&"https://app.moovelabs.com".to_string()));
    }
}
