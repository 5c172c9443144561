//! Map Service REST API
//!
//! ## Endpoints
//!
//! - `GET /api/user` - The pre-provisioned user
//! - `GET /api/directories?userId=` - Directories with map summaries
//! - `POST /api/directories`, `PATCH|DELETE /api/directories/:id`
//! - `PUT|DELETE /api/directories/:id/maps/:map_id` - Link or unlink a map
//! - `GET /api/maps?userId=` - Maps owned by a user
//! - `GET /api/map?id=` - Full map aggregate (with `ETag`)
//! - `POST /api/maps`, `PATCH|DELETE /api/maps/:id`
//! - `PUT /api/maps/:id/active-room` - Focus a room
//! - `POST /api/maps/:id/rooms`, `PATCH|DELETE /api/maps/:id/rooms/:room_id`
//! - `POST /api/maps/:id/markers`, `PATCH|DELETE /api/maps/:id/markers/:room_id`
//! - `GET /health`, `/health/live`, `/health/ready`
//! - anything else - the client application shell

pub mod config;
pub mod middleware;
pub mod routes;
pub mod shell;
pub mod state;

pub use config::ServiceConfig;
pub use middleware::{metrics_middleware, request_logging_middleware, REQUEST_ID_HEADER};
pub use routes::{create_router, ApiError, ApiJson, ApiPath, ApiQuery, ErrorResponse};
pub use shell::ClientShell;
pub use state::ServiceState;
