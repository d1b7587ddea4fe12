//! VR Session Store
//!
//! Ingestion and query service for VR session telemetry. Capture clients
//! upload batches of nested JSON samples (headset pose and gaze, controller
//! state, conversation turns, reported emotion); the service flattens each
//! sample into one relational row and serves listings, per-session detail,
//! nested re-export and aggregate statistics.
//!
//! ## Features
//!
//! - **Lossless Transcoding**: Nested samples map to 26 named columns and back,
//!   with a fixed export shape regardless of which values were captured
//! - **Two Backends, One Behavior**: PostgreSQL or an embedded SQLite file,
//!   chosen once at startup behind the [`SessionBackend`] trait
//! - **All-or-Nothing Batches**: Uploads are decoded fully before any write
//!   and inserted in a single transaction
//!
//! ## Architecture
//!
//! ```text
//! Upload (JSON array)         Session API               PostgreSQL | SQLite
//! ┌──────────────┐           ┌──────────────┐          ┌──────────────┐
//! │ ingest       │──────────▶│ transcoder   │          │ session_     │
//! │ parse_batch  │           │ flatten      │          │   records    │
//! └──────────────┘           └──────────────┘          └──────────────┘
//!                                   │                         ▲
//!                                   ▼                         │
//!                            ┌──────────────┐          ┌──────────────┐
//!                            │ Session      │─────────▶│ Session      │
//!                            │ Store        │          │ Backend      │
//!                            └──────────────┘          └──────────────┘
//!                                   │
//!                                   ▼
//!                            ┌──────────────┐
//!                            │ list / get / │
//!                            │ export/stats │
//!                            └──────────────┘
//! ```

pub mod api;
pub mod config;
pub mod ingest;
pub mod postgres_backend;
pub mod record;
pub mod session_store;
pub mod sqlite_backend;
pub mod transcoder;

pub use api::AppState;
pub use crate::config::{BackendKind, Config};
pub use ingest::{parse_batch, IngestError};
pub use postgres_backend::PostgresBackend;
pub use record::{FlatRecord, TelemetryRecord};
pub use session_store::{
    SessionBackend, SessionPage, SessionStore, SessionSummary, StoreError, StoreStats,
};
pub use sqlite_backend::SqliteBackend;
pub use transcoder::{flatten, unflatten};
