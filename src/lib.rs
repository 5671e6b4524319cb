//! # Nongor Storefront Bot
//!
//! A Telegram assistant for the Nongor clothing brand: inline menus for
//! customers and admins, order tracking against the storefront database,
//! business reports, a Gemini-backed chat with live business context and
//! background services for order alerts, uptime checks and scheduled reports.

pub mod admin;
pub mod audit;
pub mod bot;
pub mod business;
pub mod cache;
pub mod chart;
pub mod circuit_breaker;
pub mod config;
pub mod context;
pub mod crm;
pub mod db;
pub mod dialogue;
pub mod export;
pub mod gemini;
pub mod localization;
pub mod models;
pub mod reports;
pub mod scrape;
pub mod services;
pub mod session;
pub mod state;
