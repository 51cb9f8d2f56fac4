pub mod auth;
pub mod generator;
pub mod http;
pub mod pipeline;
