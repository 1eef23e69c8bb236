//! HTTP model sidecar scorer.
//!
//! Talks to a small Python service hosting the pretrained classifier:
//!
//! * `GET  /labels` -> `{"labels": ["negative", "neutral", "positive"]}`
//! * `POST /score`  <- `{"texts": [...]}` -> `{"probs": [[p0, p1, p2], ...]}`
//!
//! `probs` are laid out in the order declared by `/labels`. If the service
//! also returns a `labels` array, each label must agree with the argmax.

use async_trait::async_trait;
use log::{debug, info, warn};
use metrics::histogram;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::{LabelOrder, Polarity, SentimentScore, SentimentScorer};
use crate::{Error, Result};

#[derive(Deserialize)]
struct LabelsResponse {
    labels: Vec<String>,
}

#[derive(Serialize)]
struct ScoreRequest<'a> {
    texts: &'a [String],
}

#[derive(Deserialize)]
struct ScoreResponse {
    probs: Vec<[f64; 3]>,
    #[serde(default)]
    labels: Option<Vec<String>>,
}

/// Connected sidecar handle. Construct with [`SidecarScorer::connect`], drop
/// or [`SidecarScorer::close`] when the run is over.
#[derive(Debug)]
pub struct SidecarScorer {
    client: reqwest::Client,
    endpoint: String,
    order: LabelOrder,
    max_retries: u32,
}

impl SidecarScorer {
    /// Open a handle and fetch the model's declared label order.
    pub async fn connect(endpoint: impl Into<String>, timeout: Duration, max_retries: u32) -> Result<Self> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let url = format!("{}/labels", endpoint);
        let resp = client.get(&url).send().await?;
        if resp.status() != StatusCode::OK {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::ScorerError(format!("sidecar labels http {}: {}", status, body)));
        }
        let declared: LabelsResponse = resp.json().await?;
        let order = LabelOrder::from_labels(&declared.labels)?;
        info!("Connected to sentiment sidecar at {} (labels {:?})", endpoint, order.as_array());
        Ok(Self { client, endpoint, order, max_retries })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn close(self) {
        debug!("Closing sentiment sidecar handle {}", self.endpoint);
    }

    async fn post_scores(&self, texts: &[String]) -> Result<ScoreResponse> {
        let url = format!("{}/score", self.endpoint);
        let mut attempt = 0u32;
        loop {
            let start = Instant::now();
            let resp = self.client.post(&url).json(&ScoreRequest { texts }).send().await;
            histogram!("finsent_scorer_batch_ms", start.elapsed().as_millis() as f64);

            let retryable = match resp {
                | Ok(r) if r.status() == StatusCode::OK => return Ok(r.json().await?),
                | Ok(r) if r.status().is_server_error() => {
                    format!("sidecar http {}", r.status())
                }
                | Ok(r) => {
                    let status = r.status();
                    let body = r.text().await.unwrap_or_default();
                    return Err(Error::ScorerError(format!("sidecar http {}: {}", status, body)));
                }
                | Err(e) => e.to_string(),
            };

            if attempt >= self.max_retries {
                return Err(Error::ScorerError(format!(
                    "sidecar request failed after {} attempts: {}",
                    attempt + 1,
                    retryable
                )));
            }
            attempt += 1;
            warn!("Sidecar scoring failed ({}), retry {}/{}", retryable, attempt, self.max_retries);
            tokio::time::sleep(Duration::from_millis(200 * u64::from(attempt))).await;
        }
    }
}

#[async_trait]
impl SentimentScorer for SidecarScorer {
    fn name(&self) -> &str {
        "sidecar"
    }

    fn label_order(&self) -> LabelOrder {
        self.order
    }

    async fn score_batch(&self, texts: &[String]) -> Result<Vec<SentimentScore>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let resp = self.post_scores(texts).await?;
        if let Some(labels) = &resp.labels {
            if labels.len() != resp.probs.len() {
                return Err(Error::ScorerError(format!(
                    "sidecar returned {} labels for {} probability rows",
                    labels.len(),
                    resp.probs.len()
                )));
            }
        }

        let mut out = Vec::with_capacity(resp.probs.len());
        for (i, raw) in resp.probs.iter().enumerate() {
            let score = SentimentScore::from_probs(&self.order, *raw)?;
            let score = match &resp.labels {
                | Some(labels) => {
                    let declared: Polarity = labels[i].parse()?;
                    SentimentScore::with_label(
                        score.prob_negative,
                        score.prob_neutral,
                        score.prob_positive,
                        declared,
                    )?
                }
                | None => score,
            };
            out.push(score);
        }
        Ok(out)
    }
}
