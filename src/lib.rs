//! Library exports for the QR feedback collector
//!
//! This module exposes internal components for testing and potential library usage.

pub mod activation;
pub mod analytics;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod model;
pub mod rating;
pub mod route;
pub mod seed;
pub mod store;
pub mod validation;
