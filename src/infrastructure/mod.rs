// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod diagnostics;
pub mod gateway;
pub mod http_repository;
pub mod wire;

