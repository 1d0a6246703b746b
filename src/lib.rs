pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod expenses;
pub mod extract;
pub mod memory;
pub mod response;
pub mod state;
pub mod validation;
