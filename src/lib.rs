pub mod api;
pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod store;

// Export API types
pub use api::handlers;
pub use api::routes;

pub use error::{CrudError, Result};

// Export the engine entry points
pub use logic::{
    DocumentPreparer, FieldDefinitionResolver, GeneratorOptions, JsonSchemaGenerator,
    OperationSchema, PathMaps, PathSchemaWalker, QueryTranslator, SchemaOperation, WalkOptions,
};

// Export all model types
pub use model::*;

// Export store types
pub use store::{CollectionArtifacts, CollectionRegistry, HexObjectIdDriver, IdGenerator, IdentifierDriver};

/// Loads configuration and collections, then serves the router until the
/// listener fails.
pub async fn run_server() -> anyhow::Result<()> {
    use anyhow::Context;
    use axum::serve;
    use log::info;
    use std::sync::Arc;
    use tokio::net::TcpListener;

    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();

    let config = crate::config::AppConfig::load().context("loading configuration")?;
    info!(
        "Configuration loaded: server={}:{}",
        config.server.host, config.server.port
    );

    let registry = CollectionRegistry::load_dir(
        &config.collections.definitions_path,
        config.generator_options(),
    )?;

    let app = crate::api::routes::create_router().with_state(Arc::new(registry));

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("binding {}", bind_address))?;
    info!("crud-engine listening on http://{}", bind_address);

    serve(listener, app).await?;

    Ok(())
}
