//! HTTP client for the dashboard backend.
//!
//! Uses reqwest against `Config::api_url`. GETs are cache-busted with a
//! unique query parameter plus `Cache-Control: no-cache`, since the backend's
//! data changes underneath us after every Google sync.

use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use super::{ApiError, DashboardApi, CACHE_BUST_PARAM, USER_ID_HEADER};
use crate::types::{
    lenient, AssistantReply, CognitiveLoad, Context, DashboardData, Insight, LinkStatus,
    Recommendation, SyncReport, Task,
};

pub struct HttpApiClient {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpApiClient {
    pub fn new(api_url: &str) -> Result<Self, String> {
        let mut base_url =
            Url::parse(api_url).map_err(|e| format!("Invalid API URL '{}': {}", api_url, e))?;
        if base_url.cannot_be_a_base() {
            return Err(format!("API URL '{}' cannot be used as a base", api_url));
        }
        // Keep any path prefix when joining relative endpoint paths.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::Transport(format!("Bad endpoint {}: {}", path, e)))
    }

    /// Scoped, cache-bypassing GET.
    async fn get(&self, path: &str, user_id: &str) -> Result<reqwest::Response, ApiError> {
        let url = self.endpoint(path)?;
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let resp = self
            .client
            .get(url)
            .query(&[(CACHE_BUST_PARAM, nonce.as_str())])
            .header(USER_ID_HEADER, user_id)
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache")
            .send()
            .await?;
        Ok(resp)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, user_id: &str) -> Result<T, ApiError> {
        read_json(self.get(path, user_id).await?).await
    }

    /// Check that the backend is up. Not identity-scoped.
    pub async fn health(&self) -> Result<bool, ApiError> {
        #[derive(Deserialize)]
        struct HealthResponse {
            #[serde(default)]
            status: Option<String>,
        }

        let resp = self
            .client
            .get(self.endpoint("/health")?)
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;
        let body: HealthResponse = read_json(resp).await?;
        Ok(body.status.as_deref() == Some("healthy"))
    }

    /// Ask the backend's assistant a question about the current work data.
    pub async fn ask_assistant(
        &self,
        user_id: &str,
        query: &str,
    ) -> Result<AssistantReply, ApiError> {
        let resp = self
            .client
            .post(self.endpoint("/assistant")?)
            .header(USER_ID_HEADER, user_id)
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await?;
        read_json(resp).await
    }
}

/// Map non-2xx to `ApiError::Status`, otherwise return the raw body.
async fn read_text(resp: reqwest::Response) -> Result<String, ApiError> {
    let status = resp.status();
    let text = resp.text().await?;

    if !status.is_success() {
        return Err(ApiError::Status {
            status: status.as_u16(),
            detail: error_detail(&text),
        });
    }
    Ok(text)
}

async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ApiError> {
    let text = read_text(resp).await?;
    serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Pull a user-facing `detail` string out of an error body, if there is one.
fn error_detail(body: &str) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    json.get("detail")
        .and_then(|d| d.as_str())
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(ToString::to_string)
}

#[async_trait]
impl DashboardApi for HttpApiClient {
    async fn contexts(&self, user_id: &str) -> Result<Vec<Context>, ApiError> {
        #[derive(Deserialize)]
        struct Envelope {
            #[serde(default, deserialize_with = "lenient")]
            contexts: Vec<Context>,
        }
        let body: Envelope = self.get_json("/api/contexts", user_id).await?;
        Ok(body.contexts)
    }

    async fn tasks(&self, user_id: &str) -> Result<Vec<Task>, ApiError> {
        #[derive(Deserialize)]
        struct Envelope {
            #[serde(default, deserialize_with = "lenient")]
            tasks: Vec<Task>,
        }
        let body: Envelope = self.get_json("/api/tasks", user_id).await?;
        Ok(body.tasks)
    }

    async fn cognitive_load(&self, user_id: &str) -> Result<Option<CognitiveLoad>, ApiError> {
        #[derive(Deserialize)]
        struct Envelope {
            #[serde(default)]
            cognitive_load: serde_json::Value,
        }
        let body: Envelope = self.get_json("/api/cognitive-load", user_id).await?;
        Ok(CognitiveLoad::from_value(body.cognitive_load))
    }

    async fn insights(&self, user_id: &str) -> Result<Vec<Insight>, ApiError> {
        #[derive(Deserialize)]
        struct Envelope {
            #[serde(default, deserialize_with = "lenient")]
            insights: Vec<Insight>,
        }
        let body: Envelope = self.get_json("/api/insights", user_id).await?;
        Ok(body.insights)
    }

    async fn recommendations(&self, user_id: &str) -> Result<Vec<Recommendation>, ApiError> {
        #[derive(Deserialize)]
        struct Envelope {
            #[serde(default, deserialize_with = "lenient")]
            recommendations: Vec<Recommendation>,
        }
        let body: Envelope = self.get_json("/api/recommendations", user_id).await?;
        Ok(body.recommendations)
    }

    async fn dashboard(&self, user_id: &str) -> Result<DashboardData, ApiError> {
        self.get_json("/api/dashboard", user_id).await
    }

    async fn link_status(&self, user_id: &str) -> Result<LinkStatus, ApiError> {
        self.get_json("/api/google/status", user_id).await
    }

    async fn link_initiate(&self, user_id: &str) -> Result<(), ApiError> {
        // Only the status matters; the body is informational.
        read_text(self.get("/api/google/auth", user_id).await?).await?;
        Ok(())
    }

    async fn link_sync(&self, user_id: &str) -> Result<SyncReport, ApiError> {
        let resp = self
            .client
            .post(self.endpoint("/api/google/sync")?)
            .header(USER_ID_HEADER, user_id)
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;
        let text = read_text(resp).await?;

        // Completion is what matters; an odd body still counts as done.
        Ok(serde_json::from_str(&text).unwrap_or_else(|e| {
            log::warn!("Google sync: unreadable sync report ({}), assuming success", e);
            SyncReport::default()
        }))
    }
}
