// src/lib.rs

//! Pépites Harvester Library

pub mod error;
pub mod export;
pub mod harvest;
pub mod jobs;
pub mod models;
pub mod server;
pub mod services;
pub mod utils;
