// Library exports for the notebook backend core.

pub mod app;
pub mod app_config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod migrations;
pub mod models;
pub mod schema;
pub mod services;
pub mod utils;
pub mod ws;

pub use app::AppState;
pub use app_config::{AppConfig, CONFIG};
pub use db::{DieselPool, RedisPool};

// Diesel database pool type alias, re-exported for callers that only need
// the pool type and not the rest of `db`.
pub type DbPool = DieselPool;
