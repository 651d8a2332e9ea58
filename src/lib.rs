//! BlogHarvest - engineering blog harvesting and archival system.
//!
//! Crawls a curated index of engineering blog posts, extracts article
//! text with a tiered strategy cascade (structured data, readability,
//! headless rendering), downloads referenced images and PDFs, and
//! tracks everything in a local SQLite catalog.

pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod discovery;
pub mod extract;
pub mod migrations;
pub mod models;
pub mod repository;
pub mod schema;
pub mod scrapers;
pub mod services;
pub mod storage;
pub mod utils;
