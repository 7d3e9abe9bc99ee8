use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("[forecast/http]: {0}")]
    Http(#[from] reqwest::Error),

    #[error("[forecast/csv]: {0}")]
    Csv(#[from] csv::Error),

    #[error("[forecast/decode]: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("[forecast/insufficient-history]: need at least {required} points, have {actual}")]
    InsufficientHistory { required: usize, actual: usize },

    #[error("[forecast/empty-prediction]: predictor returned zero points")]
    EmptyPrediction,
}
