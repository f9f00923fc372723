pub mod config;
pub mod error;
pub mod expr;
pub mod manifest;
pub mod params;
pub mod render;
pub mod wasm;
