//! Nutrition Label Risk Analysis Service
//!
//! This library provides the core functionality for nutriscan, which turns
//! an uploaded nutrition-label image into a per-ingredient risk
//! classification with literature citations, using Cloudflare Workers AI
//! behind an asynchronous polling job model.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;
