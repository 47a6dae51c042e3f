//! Tollgate - In-process admission control
//!
//! This crate protects authentication and general API endpoints with
//! per-caller token buckets. Buckets are created lazily per identifier and
//! strategy, refilled greedily over time, and consulted from an axum
//! middleware that either forwards the request or answers 429.

pub mod config;
pub mod error;
pub mod event;
pub mod http;
pub mod ratelimit;
pub mod service;
