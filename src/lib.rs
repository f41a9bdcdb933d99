//! Injury-severity modelling for aviation accident records.
//!
//! The crate turns raw accident rows into fixed-width feature vectors, trains
//! a random-forest classifier plus linear and random-forest regressors,
//! persists them as one bundle and serves predictions from sparse requests.

pub mod config;
pub mod error;
pub mod ml;
pub mod models;

pub use error::{AppError, Result};
