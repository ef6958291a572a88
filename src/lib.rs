// Library exports for agora
// This allows integration tests and external code to use agora modules

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod ranking;
pub mod routes;
pub mod state;
pub mod threads;
pub mod validation;
pub mod votes;
