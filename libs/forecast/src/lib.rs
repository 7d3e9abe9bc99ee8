//! The forecast client (C3): multipart CSV upload to the remote
//! predictor and scale-ratio-aware response decoding.

pub mod client;
pub mod error;

pub use client::{ForecastClient, PredictionResponse, REQUIRED_HISTORY_POINTS};
pub use error::ForecastError;
