//! # vista-server
//!
//! Axum HTTP + `WebSocket` transports for the pipeline engine.
//!
//! - `POST /pipeline`: one request, one run, `{result, steps}` or a mapped error
//! - `GET /ws`: frame stream, one run per frame, results correlated by `frame_id`
//! - `GET /health`, `GET /plugins`: liveness and the tool catalog
//! - Graceful shutdown via `CancellationToken`, which also cancels in-flight runs

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod health;
pub mod rest;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use error::ApiError;
pub use server::{AppState, VistaServer};
pub use shutdown::ShutdownCoordinator;
