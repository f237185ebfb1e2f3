//! Wayfarer storage crate - SQLite offer catalog.
//!
//! Provides a WAL-mode SQLite database with migrations, the offer
//! repository used by conversational search, and a demo seed.

pub mod db;
pub mod migrations;
pub mod repository;
pub mod seed;

pub use db::Database;
pub use repository::OfferRepository;
pub use seed::{demo_offers, seed_demo_catalog};
