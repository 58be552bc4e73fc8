//! Answers-API adapter (quizit-style endpoint).
//!
//! One GET per load action: `{base}/quizizz/answers?pin={code}`. Transport
//! and payload problems all map to `Error::Fetch` with the cause text; the
//! core does not branch on the subtype.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use qscout_core::{
    config::Config,
    domain::{AnswerItem, AnswerKind, AnswerSet, Identifier},
    errors::Error,
    ports::AnswerFetcher,
    Result,
};

#[derive(Clone, Debug)]
pub struct QuizitClient {
    base_url: String,
    http: reqwest::Client,
}

impl QuizitClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client build");
        Self {
            base_url: base_url.into(),
            http,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.answers_api_url.clone(), cfg.fetch_timeout)
    }
}

#[async_trait]
impl AnswerFetcher for QuizitClient {
    async fn fetch(&self, identifier: &Identifier) -> Result<AnswerSet> {
        let url = format!(
            "{}/quizizz/answers?pin={}",
            self.base_url.trim_end_matches('/'),
            identifier
        );

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("request error: {e}")))?;

        if !resp.status().is_success() {
            return Err(Error::Fetch(format!("API {}", resp.status().as_u16())));
        }

        let payload: ApiResponse = resp
            .json()
            .await
            .map_err(|e| Error::Fetch(format!("json error: {e}")))?;

        convert(payload)
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    data: Option<ApiData>,
}

#[derive(Debug, Deserialize)]
struct ApiData {
    answers: Option<Vec<ApiAnswer>>,
}

#[derive(Debug, Deserialize)]
struct ApiAnswer {
    #[serde(rename = "_id")]
    id: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    answers: Vec<ApiAnswerValue>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiAnswerValue {
    #[serde(default)]
    text: Option<String>,
}

/// Map the wire payload to the core answer set. A payload without
/// `data.answers` is malformed; individual garbled items are kept as-is here
/// and dropped later during the cache rebuild.
fn convert(payload: ApiResponse) -> Result<AnswerSet> {
    let answers = payload
        .data
        .and_then(|d| d.answers)
        .ok_or_else(|| Error::Fetch("unexpected response shape (missing answers)".to_string()))?;

    let items = answers
        .into_iter()
        .map(|a| {
            let kind = match a.kind.as_deref() {
                Some("MSQ") => AnswerKind::Multiple,
                _ => AnswerKind::Single,
            };
            let raw_values = a
                .answers
                .into_iter()
                .map(|v| v.text.unwrap_or_default())
                .collect();
            AnswerItem {
                question_key: a.id,
                kind,
                raw_values,
            }
        })
        .collect();

    Ok(AnswerSet { items })
}
