//! Test fixtures for pipelines and plugins.
//!
//! Shared by the crate's own tests and usable by hosts writing tests
//! against conveyor: counting/failing stages, static plugin components,
//! and a configurable fixture plugin module.

mod fixtures;

pub use fixtures::{
    FailingStage, FixturePlugin, RecordingStage, StaticContentHandler, StaticExporter,
    StaticItemFilter, StaticScraper,
};
