//! HTTP client for the gateway report endpoints

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::de::DeserializeOwned;
use std::time::Duration;
use uuid::Uuid;

use crate::runner::ReportSource;
use aula_reports::{AssignmentInfo, ReportResponse};

#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    headers: HeaderMap,
}

impl ApiClient {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).context("Token is not a valid header value")?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            headers,
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .headers(self.headers.clone())
            .query(query)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;

        let status = response.status();
        let body = response.text().await.context("Failed to read response body")?;

        if !status.is_success() {
            anyhow::bail!("{} returned {}: {}", url, status, body);
        }

        serde_json::from_str(&body).with_context(|| format!("Unexpected response from {}", url))
    }
}

#[async_trait]
impl ReportSource for ApiClient {
    async fn assignments(&self, division_id: Uuid) -> Result<Vec<AssignmentInfo>> {
        self.get("/assignments", &[("division_id", division_id.to_string())])
            .await
    }

    async fn report(&self, assignment: &AssignmentInfo, period: u8) -> Result<ReportResponse> {
        self.get(
            "/reports/json",
            &[
                ("division_id", assignment.division_id.to_string()),
                ("materia_id", assignment.materia_id.to_string()),
                ("cuatrimestre", period.to_string()),
            ],
        )
        .await
    }
}
