//! HTTP surface.
//!
//! Thin axum handlers over the engine: extract, delegate, translate
//! errors into status codes. The caller's role arrives in the
//! `x-role` header from the auth proxy in front of this service;
//! absent or unrecognized values degrade to operator, the least
//! privileged role.

use std::time::Duration;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value as JsonValue};
use tracing::{error, info};

use trellis_common::TrellisError;
use trellis_engine::{Engine, RecordQuery, TrackOptions};
use trellis_schema::Role;

use crate::config::ServerConfig;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// The table engine.
    pub engine: Engine,
    /// Server configuration.
    pub config: ServerConfig,
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    // Bound uploads before anything buffers the body.
    let upload_limit = DefaultBodyLimit::max(state.config.max_upload_mb * 1024 * 1024);
    Router::new()
        .route("/tables/list", get(list_tables))
        .route("/tables/{name}/structure", get(table_structure))
        .route(
            "/tables/{name}/records",
            get(list_records).post(create_record),
        )
        .route(
            "/tables/{name}/records/{id}",
            get(get_record).put(update_record).delete(delete_record),
        )
        .route(
            "/tables/{name}/import-csv",
            axum::routing::post(import_csv).layer(upload_limit),
        )
        .route("/tables/{name}/export-csv", get(export_csv))
        .route("/order-tracking/track/{identifier}", get(track_order))
        .route("/order-tracking/search", get(search_orders))
        .route("/lookups", get(load_lookups))
        .with_state(state)
}

/// An engine error carried to the HTTP layer.
#[derive(Debug)]
struct ApiError(TrellisError);

impl From<TrellisError> for ApiError {
    fn from(e: TrellisError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let e = self.0;
        let status = match &e {
            TrellisError::UnknownTable { .. } | TrellisError::RecordNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            TrellisError::Validation { .. }
            | TrellisError::Parse { .. }
            | TrellisError::MissingColumns { .. }
            | TrellisError::Reference { .. } => StatusCode::BAD_REQUEST,
            TrellisError::DuplicateKey { .. } => StatusCode::CONFLICT,
            TrellisError::Schema { .. }
            | TrellisError::AggregationFailed { .. }
            | TrellisError::Store { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %e, "request failed");
        }

        let mut body = json!({
            "error": e.to_string(),
            "errorType": e.code(),
        });
        match &e {
            TrellisError::DuplicateKey { field, value }
            | TrellisError::Reference { field, value } => {
                body["field"] = json!(field);
                body["value"] = json!(value);
            }
            TrellisError::Validation { field, .. } => {
                body["field"] = json!(field);
            }
            TrellisError::MissingColumns { columns } => {
                body["columns"] = json!(columns);
            }
            _ => {}
        }
        (status, Json(body)).into_response()
    }
}

/// Reads the caller's role from the `x-role` header.
fn caller_role(headers: &HeaderMap) -> Role {
    match headers.get("x-role").and_then(|v| v.to_str().ok()) {
        Some(v) if v.eq_ignore_ascii_case("admin") => Role::Admin,
        _ => Role::Operator,
    }
}

/// Resolves a table name, refusing tables the role may not see.
///
/// A hidden table answers exactly like a missing one, so operators
/// cannot probe for lookup tables.
fn visible_table(state: &AppState, headers: &HeaderMap, name: &str) -> Result<(), ApiError> {
    let desc = state.engine.registry().describe(name)?;
    if state.engine.registry().visible(&desc, caller_role(headers)) {
        Ok(())
    } else {
        Err(ApiError(TrellisError::UnknownTable {
            table: name.to_string(),
        }))
    }
}

async fn list_tables(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let listings = state.engine.registry().list(caller_role(&headers));
    Json(listings).into_response()
}

async fn table_structure(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    visible_table(&state, &headers, &name)?;
    let desc = state.engine.registry().describe(&name)?;
    Ok(Json(&*desc).into_response())
}

#[derive(Debug, Deserialize)]
struct ListParams {
    page: Option<u64>,
    limit: Option<u64>,
    #[serde(rename = "sortField")]
    sort_field: Option<String>,
    #[serde(rename = "sortOrder")]
    sort_order: Option<String>,
    search: Option<String>,
    /// JSON-encoded `{field: value}` object.
    filters: Option<String>,
}

impl ListParams {
    /// Builds the engine query, with the configured default limit.
    fn into_query(self, default_limit: u64) -> Result<RecordQuery, ApiError> {
        let mut query = RecordQuery::default()
            .with_page(self.page.unwrap_or(1))
            .with_limit(self.limit.unwrap_or(default_limit));
        query.sort_field = self.sort_field;
        query.sort_order = self.sort_order;
        query.search = self.search.filter(|s| !s.is_empty());
        if let Some(raw) = self.filters {
            query.filters = parse_filters(&raw)?;
        }
        Ok(query)
    }
}

/// Maps a multipart read failure, including a tripped body limit.
fn multipart_error(e: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError(TrellisError::Parse {
        message: e.body_text(),
    })
}

/// Parses the `filters` query parameter.
fn parse_filters(raw: &str) -> Result<Map<String, JsonValue>, ApiError> {
    if raw.is_empty() {
        return Ok(Map::new());
    }
    serde_json::from_str::<Map<String, JsonValue>>(raw).map_err(|e| {
        ApiError(TrellisError::Parse {
            message: format!("invalid filters parameter: {e}"),
        })
    })
}

async fn list_records(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(name): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Response, ApiError> {
    visible_table(&state, &headers, &name)?;
    let query = params.into_query(state.config.page_limit)?;
    let page = state.engine.records().list(&name, &query).await?;
    Ok(Json(page).into_response())
}

async fn get_record(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((name, id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    visible_table(&state, &headers, &name)?;
    let record = state.engine.records().get_one(&name, &id).await?;
    Ok(Json(record).into_response())
}

async fn create_record(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(name): Path<String>,
    Json(body): Json<Map<String, JsonValue>>,
) -> Result<Response, ApiError> {
    visible_table(&state, &headers, &name)?;
    let record = state.engine.records().create(&name, &body).await?;
    Ok((StatusCode::CREATED, Json(record)).into_response())
}

async fn update_record(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((name, id)): Path<(String, String)>,
    Json(body): Json<Map<String, JsonValue>>,
) -> Result<Response, ApiError> {
    visible_table(&state, &headers, &name)?;
    let record = state.engine.records().update(&name, &id, &body).await?;
    Ok(Json(record).into_response())
}

async fn delete_record(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((name, id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    visible_table(&state, &headers, &name)?;
    state.engine.records().delete(&name, &id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn import_csv(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(name): Path<String>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    visible_table(&state, &headers, &name)?;

    let mut bytes = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.file_name().is_some() || field.name() == Some("file") {
                    bytes = Some(field.bytes().await.map_err(multipart_error)?);
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => return Err(multipart_error(e)),
        }
    }
    let bytes = bytes.ok_or(ApiError(TrellisError::Parse {
        message: "multipart request carried no CSV file".to_string(),
    }))?;

    info!(table = name, size = bytes.len(), "csv import requested");
    let outcome = state.engine.csv().import(&name, &bytes).await?;
    Ok(Json(outcome).into_response())
}

#[derive(Debug, Deserialize)]
struct ExportParams {
    /// JSON-encoded `{field: value}` object.
    filters: Option<String>,
}

async fn export_csv(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(name): Path<String>,
    Query(params): Query<ExportParams>,
) -> Result<Response, ApiError> {
    visible_table(&state, &headers, &name)?;
    let filters = params
        .filters
        .as_deref()
        .map(parse_filters)
        .transpose()?
        .unwrap_or_default();

    let body = state.engine.csv().export(&name, &filters).await?;
    let filename = format!(
        "{name}-{}.csv",
        chrono::Utc::now().format("%Y%m%d-%H%M%S")
    );
    let headers = [
        (header::CONTENT_TYPE, "text/csv".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        ),
    ];
    Ok((headers, body).into_response())
}

#[derive(Debug, Deserialize)]
struct TrackParams {
    /// Comma-separated per-stage projection.
    fields: Option<String>,
}

async fn track_order(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    Query(params): Query<TrackParams>,
) -> Result<Response, ApiError> {
    let mut options = TrackOptions::default()
        .with_timeout(Duration::from_millis(state.config.stage_timeout_ms));
    if let Some(fields) = params.fields {
        let fields: Vec<String> = fields
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if !fields.is_empty() {
            options = options.with_stage_fields(fields);
        }
    }

    let view = state.engine.tracking().track(&identifier, &options).await?;
    Ok(Json(view).into_response())
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    query: String,
}

async fn search_orders(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Response, ApiError> {
    if params.query.trim().len() < trellis_common::MIN_SUGGESTION_QUERY_LEN {
        return Err(ApiError(TrellisError::Validation {
            field: "query".to_string(),
            message: "requires at least 2 characters".to_string(),
        }));
    }
    let suggestions = state.engine.tracking().suggest(&params.query).await?;
    Ok(Json(json!({ "suggestions": suggestions })).into_response())
}

async fn load_lookups(State(state): State<AppState>) -> Result<Response, ApiError> {
    let data = state.engine.lookups().load().await?;
    Ok(Json(data).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use trellis_schema::production_catalog;
    use trellis_store::MemoryStore;

    fn state() -> AppState {
        let registry = Arc::new(production_catalog());
        let store = Arc::new(MemoryStore::new(Arc::clone(&registry)));
        AppState {
            engine: Engine::new(registry, store),
            config: ServerConfig::default(),
        }
    }

    fn admin_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-role", "admin".parse().unwrap());
        headers
    }

    #[test]
    fn test_role_header_defaults_to_operator() {
        assert_eq!(caller_role(&HeaderMap::new()), Role::Operator);
        assert_eq!(caller_role(&admin_headers()), Role::Admin);
        let mut headers = HeaderMap::new();
        headers.insert("x-role", "superuser".parse().unwrap());
        assert_eq!(caller_role(&headers), Role::Operator);
    }

    #[test]
    fn test_operator_cannot_see_lookup_tables() {
        let state = state();
        assert!(visible_table(&state, &admin_headers(), "ink").is_ok());
        assert!(visible_table(&state, &HeaderMap::new(), "ink").is_err());
        assert!(visible_table(&state, &HeaderMap::new(), "cutting").is_ok());
    }

    #[test]
    fn test_duplicate_key_maps_to_conflict_payload() {
        let response = ApiError(TrellisError::DuplicateKey {
            field: "code_number".to_string(),
            value: "INK-1".to_string(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_filters_parameter_must_be_json_object() {
        assert!(parse_filters("").unwrap().is_empty());
        assert!(parse_filters(r#"{"machine":"M1"}"#).is_ok());
        assert!(parse_filters("machine=M1").is_err());
    }

    fn multipart_request(table: &str, payload: &[u8]) -> axum::http::Request<axum::body::Body> {
        let boundary = "trellis-test-boundary";
        let mut body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"rows.csv\"\r\n\
             Content-Type: text/csv\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(payload);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        axum::http::Request::builder()
            .method("POST")
            .uri(format!("/tables/{table}/import-csv"))
            .header("x-role", "admin")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(axum::body::Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_import_within_limit_is_accepted() {
        use tower::ServiceExt;

        let app = router(state());
        let csv = "code_number,supplier,color,code,pal_number,batch_palet_number,date,is_finished\n\
                   INK-1,ChemCo,Cyan,C1,,,2024-01-10,false\n";
        let response = app
            .oneshot(multipart_request("ink", csv.as_bytes()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_oversized_upload_is_refused() {
        use tower::ServiceExt;

        let mut state = state();
        state.config.max_upload_mb = 1;
        let app = router(state);

        let payload = vec![b'a'; 2 * 1024 * 1024];
        let response = app
            .oneshot(multipart_request("ink", &payload))
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }

    #[test]
    fn test_list_params_clamp_and_default() {
        let params = ListParams {
            page: Some(0),
            limit: None,
            sort_field: None,
            sort_order: None,
            search: Some(String::new()),
            filters: None,
        };
        let query = params.into_query(25).unwrap();
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, 25);
        assert!(query.search.is_none());
    }
}
