//! Multi-source page discovery and AI-driven page selection.

pub mod ai_selector;
pub mod crawler;
pub mod merge;
pub mod plan;
pub mod robots;
pub mod sitemap;

pub use plan::build_plan;
