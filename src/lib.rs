//! Newsroom - a news portal CMS
//!
//! Public reading API (posts, categories, breaking news, contact form) and
//! the staff dashboard API behind cookie or bearer sessions.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
