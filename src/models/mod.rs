// src/models/mod.rs

//! Domain models for the harvester.
//!
//! This module contains all data structures used throughout the
//! application, organized by their primary purpose.

mod category;
mod config;
mod record;

// Re-export all public types
pub use category::{merge_categories, Category, CategoryMap};
pub use config::{AnnuaireConfig, Config, CrawlerConfig, ExportConfig, ServerConfig};
pub use record::{DetailFields, Record, School, Startup};
