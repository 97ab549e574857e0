//! API module - HTTP routes, handlers, and models

pub mod admin_handlers;
pub mod auth;
pub mod handlers;
pub mod models;
pub mod routes;
