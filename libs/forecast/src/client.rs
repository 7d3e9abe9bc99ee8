use std::time::Duration;

use chrono::NaiveDateTime;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::instrument;

use crate::error::ForecastError;

/// Minimum history length the predictor requires (SPEC_FULL.md §4.3).
pub const REQUIRED_HISTORY_POINTS: usize = 180;

#[derive(Debug, Deserialize)]
pub struct PredictionResponse {
    pub length: usize,
    pub pred: Vec<f64>,
}

/// Sends a recent demand time series to the predictor and returns its
/// forecast. One instance is shared by the predictive controller across
/// all (zone, site) calls.
#[derive(Clone)]
pub struct ForecastClient {
    http: reqwest::Client,
    base_url: String,
    scale_ratio: u32,
}

impl ForecastClient {
    pub fn new(host: &str, port: u16, scale_ratio: u32) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(600))
            .build()
            .expect("forecast http client construction should not fail");
        Self {
            http,
            base_url: format!("http://{host}:{port}"),
            scale_ratio: scale_ratio.max(1),
        }
    }

    /// `points` must be sorted ascending by date and have at least
    /// `REQUIRED_HISTORY_POINTS` entries; each value is `instances +
    /// login_failures` for that minute.
    #[instrument(skip(self, points), fields(zone_id, site_id, n = points.len()))]
    pub async fn predict(
        &self,
        zone_id: &str,
        site_id: &str,
        points: &[(NaiveDateTime, i64)],
    ) -> Result<f64, ForecastError> {
        if points.len() < REQUIRED_HISTORY_POINTS {
            return Err(ForecastError::InsufficientHistory {
                required: REQUIRED_HISTORY_POINTS,
                actual: points.len(),
            });
        }

        let csv_bytes = self.build_csv(points)?;
        let url = format!("{}/predict/{zone_id}/{site_id}", self.base_url);
        let part = Part::bytes(csv_bytes)
            .file_name("source.csv")
            .mime_str("text/csv")
            .expect("text/csv is a valid mime type");
        let form = Form::new().part("source", part);

        let response = self.http.post(&url).multipart(form).send().await?;
        let response = response.error_for_status()?;
        let parsed: PredictionResponse = response.json().await?;

        if parsed.pred.is_empty() {
            return Err(ForecastError::EmptyPrediction);
        }

        let scale = self.scale_ratio as f64;
        let peak = parsed
            .pred
            .iter()
            .copied()
            .fold(f64::MIN, f64::max)
            / scale;
        Ok(peak)
    }

    fn build_csv(&self, points: &[(NaiveDateTime, i64)]) -> Result<Vec<u8>, ForecastError> {
        let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
        writer.write_record(["date", "value"])?;
        for (date, value) in points {
            let scaled = *value as i64 * self.scale_ratio as i64;
            writer.write_record([date.format("%Y-%m-%d %H:%M:%S").to_string(), scaled.to_string()])?;
        }
        writer.flush()?;
        Ok(writer.into_inner().expect("in-memory writer never fails to unwrap"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_header_and_scaling() {
        let client = ForecastClient::new("predictor", 9000, 10);
        let points = vec![(
            NaiveDateTime::parse_from_str("2026-01-01 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap(),
            5,
        )];
        let csv = client.build_csv(&points).unwrap();
        let text = String::from_utf8(csv).unwrap();
        assert!(text.starts_with("date,value\n"));
        assert!(text.contains("2026-01-01 00:00:00,50"));
    }
}
