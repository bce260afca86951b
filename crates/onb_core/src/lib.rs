pub mod citations;
pub mod config;
pub mod domain;
pub mod error;
pub mod preview;
pub mod sources;
pub mod transcript;
pub mod validate;
