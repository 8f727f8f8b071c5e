pub mod api;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod error;
pub mod gateway;
pub mod observability;
pub mod routing;
pub mod state;
pub mod transport;
