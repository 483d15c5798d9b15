pub mod app;
pub mod config;
pub mod discord;
pub mod error;
pub mod middleware;
pub mod observer;
pub mod routes;
