use serde::{Deserialize, Serialize};

use crate::logic::GeneratorOptions;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub collections: CollectionsConfig,
    pub crud: CrudConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionsConfig {
    pub definitions_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrudConfig {
    pub max_limit: u64,
    pub limit_constraint_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl Default for CollectionsConfig {
    fn default() -> Self {
        Self {
            definitions_path: "definitions".to_string(),
        }
    }
}

impl Default for CrudConfig {
    fn default() -> Self {
        Self {
            max_limit: 200,
            limit_constraint_enabled: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and config file
    pub fn load() -> anyhow::Result<Self> {
        let mut config = config::Config::builder();

        // Add default configuration
        config = config.add_source(config::Config::try_from(&AppConfig::default())?);

        // Add config file if it exists
        config = config.add_source(config::File::with_name("config").required(false));

        // Environment variables with prefix "CRUD_", e.g. CRUD_SERVER__PORT
        config = config.add_source(
            config::Environment::with_prefix("CRUD")
                .prefix_separator("_")
                .separator("__"),
        );

        let config = config.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        Ok(app_config)
    }

    /// Get the server bind address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn generator_options(&self) -> GeneratorOptions {
        GeneratorOptions {
            max_limit: self.crud.max_limit,
            limit_constraint_enabled: self.crud.limit_constraint_enabled,
        }
    }
}
