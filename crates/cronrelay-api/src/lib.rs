//! # CronRelay API
//!
//! HTTP surface over the scheduler engine.
//!
//! - **Runner**: `GET /runJob/{jobID}/{executionID}`
//! - **Master**: `POST /runJobNow/{jobID}`, `POST /master/enable|disable`
//! - **Status**: `POST /executions/{executionID}/heartbeat|done|fail|skip`
//! - **Admin**: job CRUD, execution and runner inspection
//! - **Monitoring**: `GET /health`

pub mod error;
pub mod http;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use http::routes::create_router;
pub use server::ApiServer;
pub use state::AppState;
