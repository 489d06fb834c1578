//! Builders to construct an engine from its ports and configuration.

pub mod engine_builder;

pub use engine_builder::EngineBuilder;
