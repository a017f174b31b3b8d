//! Command-line entry point and HTTP service wiring.

mod cli;
mod commands;
mod infra;
mod routes;
mod server;

use crate::error::AppError;

pub use routes::service_router;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
