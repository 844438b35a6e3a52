// src/lib.rs

//! Errand Crawler Library
//!
//! Fetches time-bounded channel histories, classifies official errand
//! reports by region and saves them to a record sink.

pub mod analysis;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod sources;
pub mod storage;
pub mod utils;
