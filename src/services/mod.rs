// src/services/mod.rs

//! Concrete data sources.
//!
//! - `directory`: the startup directory site (HTML listing + detail
//!   pages + category discovery)
//! - `annuaire`: the national school directory open-data API

pub mod annuaire;
pub mod directory;

pub use annuaire::AnnuaireClient;
pub use directory::DirectoryClient;
