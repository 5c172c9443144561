//! Axum routes for the map service.
//!
//! Handlers only marshal: they parse ids and bodies, call the store or a
//! read-side service, and translate errors into status codes.

use async_trait::async_trait;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts, Json, Path, Query, Request, State,
    },
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::{get, patch, post, put},
    Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use tower_http::services::ServeDir;

use crate::canonical::canonical_hash_hex;
use crate::store::{EntityStore, MapPatch, RoomPatch, StoreError};
use crate::types::{
    Directory, DirectoryId, DirectorySummary, Map, MapId, MapSummary, MapView, Marker, Position,
    Room, RoomId, UserId, UserProfile,
};
use crate::view::ViewError;
use crate::CATALOG_SCHEMA_VERSION;

use super::state::ServiceState;

type SharedState<S> = State<Arc<ServiceState<S>>>;

// ============================================================================
// Request/Response Types
// ============================================================================

/// `?userId=` query.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    /// User to list for.
    pub user_id: UserId,
}

/// `?id=` query.
#[derive(Debug, Clone, Deserialize)]
pub struct MapQuery {
    /// Map to build.
    pub id: MapId,
}

/// Request to create a directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDirectoryRequest {
    /// Owning user.
    pub owner_id: UserId,
    /// Directory name.
    pub name: String,
}

/// Request to rename a directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameDirectoryRequest {
    /// New name.
    pub name: String,
}

/// Request to create a map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMapRequest {
    /// Owning user.
    pub owner_id: UserId,
    /// Map name.
    pub name: String,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Image URL.
    #[serde(default)]
    pub image_url: String,
}

/// Request to add a room. Without `listPosition` the room is appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    /// Room name.
    pub name: String,
    /// Markdown description.
    #[serde(default)]
    pub description: String,
    /// Display position.
    pub list_position: Option<i64>,
}

/// Request to focus a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveRoomRequest {
    /// Room to focus.
    pub room_id: RoomId,
}

/// Request to place a marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMarkerRequest {
    /// Annotated room.
    pub room_id: RoomId,
    /// `[x, y]` on the map image.
    pub position: Position,
}

/// Request to move a marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveMarkerRequest {
    /// New `[x, y]`.
    pub position: Position,
}

/// Service health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub schema_version: String,
    pub users: usize,
    pub directories: usize,
    pub maps: usize,
    pub ids_issued: u64,
}

/// Simple liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResponse {
    pub status: String,
}

/// Readiness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub details: Option<String>,
}

/// Structured error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
    /// Machine-readable error code.
    pub code: String,
    /// Additional error details (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    /// Create a new error response with code and message.
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            details: None,
        }
    }

    /// Add details to the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// An error response with its status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    /// Build an error from parts.
    pub fn new(status: StatusCode, body: ErrorResponse) -> Self {
        Self { status, body }
    }

    /// Status code this error maps to.
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let (status, code) = match &err {
            StoreError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            StoreError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            StoreError::InvalidReference(_) => (StatusCode::BAD_REQUEST, "INVALID_REFERENCE"),
            StoreError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            StoreError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_FAILED"),
        };
        Self::new(status, ErrorResponse::new(code, err.to_string()))
    }
}

impl From<ViewError> for ApiError {
    fn from(err: ViewError) -> Self {
        match &err {
            ViewError::NotFound { .. } => {
                Self::new(StatusCode::NOT_FOUND, ErrorResponse::new("NOT_FOUND", err.to_string()))
            }
            ViewError::Integrity { id, .. } => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new("INTEGRITY_VIOLATION", format!("Stored data for {id} is inconsistent"))
                    .with_details(err.to_string()),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = %self.body.code, error = %self.body.error, "Request failed");
        } else {
            tracing::warn!(code = %self.body.code, error = %self.body.error, "Request error");
        }
        (self.status, Json(self.body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), ErrorResponse::new("INVALID_BODY", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ErrorResponse::new("INVALID_QUERY", rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::new(rejection.status(), ErrorResponse::new("INVALID_PATH", rejection.body_text()))
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ============================================================================
// Extractors
// ============================================================================

/// [`Json`] body whose rejection is an [`ApiError`].
#[derive(Debug, Clone)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// [`Query`] string whose rejection is an [`ApiError`].
#[derive(Debug, Clone)]
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

/// [`Path`] parameters whose rejection is an [`ApiError`].
#[derive(Debug, Clone)]
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

// ============================================================================
// Read Handlers
// ============================================================================

/// The pre-provisioned user.
async fn user_handler<S: EntityStore + 'static>(
    State(state): SharedState<S>,
) -> ApiResult<Json<UserProfile>> {
    Ok(Json(state.lister.user(&state.current_user)?))
}

/// Directories of a user with their map summaries.
async fn list_directories_handler<S: EntityStore + 'static>(
    State(state): SharedState<S>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> ApiResult<Json<Vec<DirectorySummary>>> {
    Ok(Json(state.lister.list_directories(&query.user_id)?))
}

/// Maps owned by a user.
async fn list_maps_handler<S: EntityStore + 'static>(
    State(state): SharedState<S>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> ApiResult<Json<Vec<MapSummary>>> {
    Ok(Json(state.lister.list_maps(&query.user_id)?))
}

/// Full map aggregate, with an `ETag` over its canonical JSON.
async fn map_view_handler<S: EntityStore + 'static>(
    State(state): SharedState<S>,
    ApiQuery(query): ApiQuery<MapQuery>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let view: MapView = state.views.build(&query.id)?;
    let etag = format!("\"{}\"", canonical_hash_hex(&view));

    let fresh = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.split(',').any(|tag| tag.trim() == etag));
    let etag_header = HeaderValue::from_str(&etag).map_err(|e| {
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse::new("ETAG_FAILED", e.to_string()))
    })?;

    if fresh {
        return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, etag_header)]).into_response());
    }
    Ok(([(header::ETAG, etag_header)], Json(view)).into_response())
}

// ============================================================================
// Directory Handlers
// ============================================================================

async fn create_directory_handler<S: EntityStore + 'static>(
    State(state): SharedState<S>,
    ApiJson(request): ApiJson<CreateDirectoryRequest>,
) -> ApiResult<(StatusCode, Json<Directory>)> {
    let directory = state
        .store
        .transact(move |c| c.create_directory(&request.owner_id, &request.name))
        .await?;
    tracing::info!(directory_id = %directory.id, owner_id = %directory.owner_id, "Directory created");
    Ok((StatusCode::CREATED, Json(directory)))
}

async fn rename_directory_handler<S: EntityStore + 'static>(
    State(state): SharedState<S>,
    ApiPath(id): ApiPath<DirectoryId>,
    ApiJson(request): ApiJson<RenameDirectoryRequest>,
) -> ApiResult<Json<Directory>> {
    let directory = state
        .store
        .transact(move |c| c.rename_directory(&id, &request.name))
        .await?;
    Ok(Json(directory))
}

async fn delete_directory_handler<S: EntityStore + 'static>(
    State(state): SharedState<S>,
    ApiPath(id): ApiPath<DirectoryId>,
) -> ApiResult<StatusCode> {
    let log_id = id.clone();
    let removed = state.store.transact(move |c| c.delete_directory(&id)).await?;
    if removed {
        tracing::info!(directory_id = %log_id, "Directory deleted");
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn link_map_handler<S: EntityStore + 'static>(
    State(state): SharedState<S>,
    ApiPath((directory_id, map_id)): ApiPath<(DirectoryId, MapId)>,
) -> ApiResult<StatusCode> {
    state
        .store
        .transact(move |c| c.link_map_to_directory(&directory_id, &map_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn unlink_map_handler<S: EntityStore + 'static>(
    State(state): SharedState<S>,
    ApiPath((directory_id, map_id)): ApiPath<(DirectoryId, MapId)>,
) -> ApiResult<StatusCode> {
    state
        .store
        .transact(move |c| c.unlink_map_from_directory(&directory_id, &map_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Map Handlers
// ============================================================================

async fn create_map_handler<S: EntityStore + 'static>(
    State(state): SharedState<S>,
    ApiJson(request): ApiJson<CreateMapRequest>,
) -> ApiResult<(StatusCode, Json<Map>)> {
    let map = state
        .store
        .transact(move |c| {
            c.create_map(&request.owner_id, &request.name, &request.description, &request.image_url)
        })
        .await?;
    tracing::info!(map_id = %map.id, owner_id = %map.owner_id, "Map created");
    Ok((StatusCode::CREATED, Json(map)))
}

async fn update_map_handler<S: EntityStore + 'static>(
    State(state): SharedState<S>,
    ApiPath(id): ApiPath<MapId>,
    ApiJson(patch): ApiJson<MapPatch>,
) -> ApiResult<Json<Map>> {
    let map = state.store.transact(move |c| c.update_map(&id, patch)).await?;
    Ok(Json(map))
}

async fn delete_map_handler<S: EntityStore + 'static>(
    State(state): SharedState<S>,
    ApiPath(id): ApiPath<MapId>,
) -> ApiResult<StatusCode> {
    let log_id = id.clone();
    let removed = state.store.transact(move |c| c.delete_map(&id)).await?;
    if removed {
        tracing::info!(map_id = %log_id, "Map deleted with its rooms and markers");
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn set_active_room_handler<S: EntityStore + 'static>(
    State(state): SharedState<S>,
    ApiPath(id): ApiPath<MapId>,
    ApiJson(request): ApiJson<ActiveRoomRequest>,
) -> ApiResult<StatusCode> {
    state
        .store
        .transact(move |c| c.set_active_room(&id, &request.room_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Room Handlers
// ============================================================================

async fn add_room_handler<S: EntityStore + 'static>(
    State(state): SharedState<S>,
    ApiPath(map_id): ApiPath<MapId>,
    ApiJson(request): ApiJson<CreateRoomRequest>,
) -> ApiResult<(StatusCode, Json<Room>)> {
    let log_map = map_id.clone();
    let room = state
        .store
        .transact(move |c| {
            let position = match request.list_position {
                Some(position) => position,
                None => c.next_list_position(&map_id)?,
            };
            c.add_room(&map_id, &request.name, &request.description, position)
        })
        .await?;
    tracing::info!(map_id = %log_map, room_id = %room.id, list_position = room.list_position, "Room added");
    Ok((StatusCode::CREATED, Json(room)))
}

async fn update_room_handler<S: EntityStore + 'static>(
    State(state): SharedState<S>,
    ApiPath((map_id, room_id)): ApiPath<(MapId, RoomId)>,
    ApiJson(patch): ApiJson<RoomPatch>,
) -> ApiResult<Json<Room>> {
    let room = state
        .store
        .transact(move |c| c.update_room(&map_id, &room_id, patch))
        .await?;
    Ok(Json(room))
}

async fn delete_room_handler<S: EntityStore + 'static>(
    State(state): SharedState<S>,
    ApiPath((map_id, room_id)): ApiPath<(MapId, RoomId)>,
) -> ApiResult<StatusCode> {
    state
        .store
        .transact(move |c| c.delete_room(&map_id, &room_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Marker Handlers
// ============================================================================

async fn add_marker_handler<S: EntityStore + 'static>(
    State(state): SharedState<S>,
    ApiPath(map_id): ApiPath<MapId>,
    ApiJson(request): ApiJson<AddMarkerRequest>,
) -> ApiResult<(StatusCode, Json<Marker>)> {
    let marker = state
        .store
        .transact(move |c| c.add_marker(&map_id, &request.room_id, request.position))
        .await?;
    Ok((StatusCode::CREATED, Json(marker)))
}

async fn move_marker_handler<S: EntityStore + 'static>(
    State(state): SharedState<S>,
    ApiPath((map_id, room_id)): ApiPath<(MapId, RoomId)>,
    ApiJson(request): ApiJson<MoveMarkerRequest>,
) -> ApiResult<Json<Marker>> {
    let marker = state
        .store
        .transact(move |c| c.move_marker(&map_id, &room_id, request.position))
        .await?;
    Ok(Json(marker))
}

async fn remove_marker_handler<S: EntityStore + 'static>(
    State(state): SharedState<S>,
    ApiPath((map_id, room_id)): ApiPath<(MapId, RoomId)>,
) -> ApiResult<StatusCode> {
    state
        .store
        .transact(move |c| c.remove_marker(&map_id, &room_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Health and Shell
// ============================================================================

/// Health check endpoint (detailed).
async fn health_handler<S: EntityStore + 'static>(
    State(state): SharedState<S>,
) -> Json<HealthResponse> {
    let catalog = state.store.snapshot();
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        schema_version: CATALOG_SCHEMA_VERSION.to_string(),
        users: catalog.users().count(),
        directories: catalog.num_directories(),
        maps: catalog.num_maps(),
        ids_issued: catalog.ids_issued(),
    })
}

/// Liveness probe endpoint.
async fn liveness_handler() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "alive".to_string(),
    })
}

/// Readiness probe endpoint.
///
/// Ready once the pre-provisioned user resolves in the store.
async fn readiness_handler<S: EntityStore + 'static>(
    State(state): SharedState<S>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    if state.store.snapshot().user(&state.current_user).is_some() {
        Ok(Json(ReadinessResponse { ready: true, details: None }))
    } else {
        Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                ready: false,
                details: Some("Current user is not provisioned".to_string()),
            }),
        ))
    }
}

/// Everything outside the API serves the client shell and the client
/// router takes over; unknown `/api` paths get a JSON 404 instead.
async fn fallback_handler<S: EntityStore + 'static>(State(state): SharedState<S>, uri: Uri) -> Response {
    let path = uri.path();
    if path == "/api" || path.starts_with("/api/") {
        return ApiError::new(
            StatusCode::NOT_FOUND,
            ErrorResponse::new("NO_SUCH_ENDPOINT", "No such API endpoint").with_details(path.to_string()),
        )
        .into_response();
    }
    Html(state.shell.html().to_string()).into_response()
}

// ============================================================================
// Router Construction
// ============================================================================

/// Create the Axum router for the map service.
pub fn create_router<S: EntityStore + 'static>(state: ServiceState<S>) -> Router {
    let assets = state.shell.assets().map(ServeDir::new);
    let state = Arc::new(state);

    let mut router = Router::new()
        // Reads
        .route("/api/user", get(user_handler::<S>))
        .route("/api/directories", get(list_directories_handler::<S>).post(create_directory_handler::<S>))
        .route("/api/maps", get(list_maps_handler::<S>).post(create_map_handler::<S>))
        .route("/api/map", get(map_view_handler::<S>))
        // Directories
        .route(
            "/api/directories/:id",
            patch(rename_directory_handler::<S>).delete(delete_directory_handler::<S>),
        )
        .route(
            "/api/directories/:id/maps/:map_id",
            put(link_map_handler::<S>).delete(unlink_map_handler::<S>),
        )
        // Maps
        .route(
            "/api/maps/:id",
            patch(update_map_handler::<S>).delete(delete_map_handler::<S>),
        )
        .route("/api/maps/:id/active-room", put(set_active_room_handler::<S>))
        // Rooms
        .route("/api/maps/:id/rooms", post(add_room_handler::<S>))
        .route(
            "/api/maps/:id/rooms/:room_id",
            patch(update_room_handler::<S>).delete(delete_room_handler::<S>),
        )
        // Markers
        .route("/api/maps/:id/markers", post(add_marker_handler::<S>))
        .route(
            "/api/maps/:id/markers/:room_id",
            patch(move_marker_handler::<S>).delete(remove_marker_handler::<S>),
        )
        // Health checks
        .route("/health", get(health_handler::<S>))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler::<S>));

    if let Some(assets) = assets {
        router = router.nest_service("/static", assets);
    }

    router.fallback(fallback_handler::<S>).with_state(state)
}
