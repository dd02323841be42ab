//! Somnia Exchange points API client.
//!
//! Base URL: https://api.somnia.exchange/api
//! - `GET  /leaderboard?wallet=<address>`
//! - `POST /completeTask {address, taskId}`
//!
//! The API sits behind the exchange front-end and expects browser-style
//! origin/referer headers.

use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers::types::Address;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, ORIGIN, REFERER};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{ScoringService, Standing, TaskAward};

pub const DEFAULT_BASE_URL: &str = "https://api.somnia.exchange/api";
pub const DEFAULT_TASK_ID: &str = "make-swap";

const FRONTEND_ORIGIN: &str = "https://somnia.exchange";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/134.0.0.0 Safari/537.36";

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeaderboardResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    current_user: Option<LeaderboardUser>,
}

#[derive(Debug, Deserialize)]
struct LeaderboardUser {
    #[serde(default)]
    points: u64,
    #[serde(default)]
    rank: u64,
}

#[derive(Debug, Deserialize)]
struct CompleteTaskResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<CompleteTaskData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompleteTaskData {
    task: Option<AwardedTask>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AwardedTask {
    #[serde(default)]
    actual_points_awarded: u64,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct SomniaPointsClient {
    http: Client,
    base_url: String,
    task_id: String,
}

impl SomniaPointsClient {
    pub fn new(base_url: Option<String>, task_id: Option<String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ORIGIN, HeaderValue::from_static(FRONTEND_ORIGIN));
        headers.insert(REFERER, HeaderValue::from_static("https://somnia.exchange/"));
        headers.insert("cache-control", HeaderValue::from_static("no-cache"));
        headers.insert("pragma", HeaderValue::from_static("no-cache"));
        headers.insert("sec-fetch-dest", HeaderValue::from_static("empty"));
        headers.insert("sec-fetch-mode", HeaderValue::from_static("cors"));
        headers.insert("sec-fetch-site", HeaderValue::from_static("same-site"));

        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client for the points API")?;

        Ok(Self {
            http,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            task_id: task_id.unwrap_or_else(|| DEFAULT_TASK_ID.to_string()),
        })
    }

    fn parse_standing(body: &str) -> Result<Standing> {
        let resp: LeaderboardResponse =
            serde_json::from_str(body).context("Failed to parse leaderboard response")?;
        match (resp.success, resp.current_user) {
            (true, Some(user)) => Ok(Standing {
                points: user.points,
                rank: user.rank,
            }),
            _ => Ok(Standing::default()),
        }
    }

    fn parse_award(status_ok: bool, body: &str) -> Result<TaskAward> {
        let resp: CompleteTaskResponse =
            serde_json::from_str(body).context("Failed to parse completeTask response")?;
        if !status_ok || !resp.success {
            anyhow::bail!(
                "completeTask rejected: {}",
                resp.error.unwrap_or_else(|| "no reason given".into())
            );
        }
        let points_awarded = resp
            .data
            .and_then(|d| d.task)
            .map(|t| t.actual_points_awarded)
            .unwrap_or(0);
        Ok(TaskAward { points_awarded })
    }
}

#[async_trait]
impl ScoringService for SomniaPointsClient {
    async fn standing(&self, wallet: Address) -> Result<Standing> {
        let url = format!(
            "{}/leaderboard?wallet={}",
            self.base_url,
            urlencoding::encode(&format!("{wallet:?}"))
        );
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context("Leaderboard request failed")?;

        if !resp.status().is_success() {
            anyhow::bail!("Leaderboard request failed: {}", resp.status());
        }
        let body = resp.text().await.context("Failed to read leaderboard body")?;
        let standing = Self::parse_standing(&body)?;
        debug!(points = standing.points, rank = standing.rank, "Leaderboard standing");
        Ok(standing)
    }

    async fn complete_task(&self, wallet: Address) -> Result<TaskAward> {
        let payload = serde_json::json!({
            "address": format!("{wallet:?}"),
            "taskId": self.task_id,
        });
        let resp = self
            .http
            .post(format!("{}/completeTask", self.base_url))
            .json(&payload)
            .send()
            .await
            .context("completeTask request failed")?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Self::parse_award(status.is_success(), &body)
            .with_context(|| format!("completeTask returned {status}"))
    }
}
