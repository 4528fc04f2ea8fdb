use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    Json as RequestJson,
};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::CrudError;
use crate::logic::{QueryTranslator, SchemaOperation};
use crate::store::{CollectionArtifacts, CollectionRegistry};

pub type AppState = Arc<CollectionRegistry>;

type HandlerError = (StatusCode, Json<ErrorResponse>);

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: &str) -> Self {
        Self {
            error: message.to_string(),
        }
    }
}

impl From<CrudError> for ErrorResponse {
    fn from(err: CrudError) -> Self {
        Self::new(&err.to_string())
    }
}

fn crud_error(err: CrudError) -> HandlerError {
    let status = if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(err.into()))
}

fn not_found(message: &str) -> HandlerError {
    (StatusCode::NOT_FOUND, Json(ErrorResponse::new(message)))
}

fn collection(registry: &CollectionRegistry, name: &str) -> Result<Arc<CollectionArtifacts>, HandlerError> {
    registry
        .get(name)
        .ok_or_else(|| not_found(&format!("Collection {} not found", name)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSummary {
    pub name: String,
    pub endpoint_base_path: String,
    pub is_view: bool,
}

pub async fn list_collections(
    State(registry): State<AppState>,
) -> Json<ListResponse<CollectionSummary>> {
    let items: Vec<CollectionSummary> = registry
        .iter()
        .map(|c| CollectionSummary {
            name: c.model.name.clone(),
            endpoint_base_path: c.model.endpoint_base_path.clone(),
            is_view: c.model.is_view(),
        })
        .collect();
    let total = items.len();
    Json(ListResponse { items, total })
}

pub async fn get_json_schema(
    State(registry): State<AppState>,
    Path((name, operation)): Path<(String, String)>,
) -> Result<Json<Value>, HandlerError> {
    let collection = collection(&registry, &name)?;
    let operation = SchemaOperation::parse(&operation)
        .ok_or_else(|| not_found(&format!("Operation {} not found", operation)))?;
    let schema = collection
        .generator
        .generate(operation)
        .to_value()
        .map_err(|err| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(&err.to_string())),
            )
        })?;
    Ok(Json(schema))
}

#[derive(Debug, Serialize)]
pub struct TranslatedQuery {
    pub query: Value,
}

/// Casts a filter exactly as a read or delete would before reaching the store.
pub async fn translate_query(
    State(registry): State<AppState>,
    Path(name): Path<String>,
    RequestJson(mut query): RequestJson<Value>,
) -> Result<Json<TranslatedQuery>, HandlerError> {
    let collection = collection(&registry, &name)?;
    let translator = &collection.translator;

    if QueryTranslator::is_text_search_query(&query) {
        translator
            .parse_and_cast_text_search_query(&query, &collection.normal_indexed_fields)
            .map_err(crud_error)?;
    }
    translator.parse_and_cast(&mut query).map_err(crud_error)?;
    debug!("translated query on {}", name);

    Ok(Json(TranslatedQuery { query }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateCommandsRequest {
    pub commands: Value,
    pub editable_fields: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct TranslatedCommands {
    pub commands: Value,
}

pub async fn translate_commands(
    State(registry): State<AppState>,
    Path(name): Path<String>,
    RequestJson(request): RequestJson<TranslateCommandsRequest>,
) -> Result<Json<TranslatedCommands>, HandlerError> {
    let collection = collection(&registry, &name)?;
    let editable: BTreeSet<String> = match request.editable_fields {
        Some(fields) => fields.into_iter().collect(),
        None => collection.editable_fields(),
    };

    let mut commands = request.commands;
    collection
        .translator
        .parse_and_cast_commands(&mut commands, &editable)
        .map_err(crud_error)?;

    Ok(Json(TranslatedCommands { commands }))
}
