pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod guard;
pub mod password;
pub mod security;
pub mod services;
pub mod state;
pub mod sweeper;
pub mod throttle;
pub mod tokens;
pub mod validation;
