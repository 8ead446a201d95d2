//! HTTP surface: every route lives under `/api/external-api`, plus `/health`.

pub mod handlers;
mod server;

pub use server::serve;
