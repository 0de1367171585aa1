pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod router;
pub mod sanitize;
pub mod services;
pub mod state;
