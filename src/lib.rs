//! MTG Blog - a Magic: The Gathering blog
//!
//! Topics, Markdown posts with moderated comments, and a photo contest,
//! served as HTML pages plus a small JSON API.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod theme;
