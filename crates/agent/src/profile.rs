use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("profile fetch failed: {0}")]
    Http(String),
    #[error("profile fetch rejected with status {status}")]
    Status { status: u16 },
}

/// Best-effort structured summary of a third-party profile page. How it is
/// produced is the fetcher's business; only the retry/fallback contract is
/// fixed here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProfileSummary {
    pub url: String,
    pub summary: String,
}

#[async_trait]
pub trait ProfileFetcher: Send + Sync {
    /// `Ok(None)` means the page answered but held nothing summarizable;
    /// callers treat that the same as a failed attempt.
    async fn fetch(&self, url: &str) -> Result<Option<ProfileSummary>, FetchError>;
}

#[async_trait]
impl<F> ProfileFetcher for std::sync::Arc<F>
where
    F: ProfileFetcher + ?Sized,
{
    async fn fetch(&self, url: &str) -> Result<Option<ProfileSummary>, FetchError> {
        (**self).fetch(url).await
    }
}

/// Cap on how much raw page text is carried into the synthesis prompt.
const SUMMARY_MAX_CHARS: usize = 4000;

pub struct HttpProfileFetcher {
    http: reqwest::Client,
}

impl HttpProfileFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs.max(1)))
            .build()
            .map_err(|error| FetchError::Http(error.to_string()))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl ProfileFetcher for HttpProfileFetcher {
    async fn fetch(&self, url: &str) -> Result<Option<ProfileSummary>, FetchError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|error| FetchError::Http(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { status: status.as_u16() });
        }

        let body = response.text().await.map_err(|error| FetchError::Http(error.to_string()))?;
        let summary: String = body.chars().take(SUMMARY_MAX_CHARS).collect();
        if summary.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(ProfileSummary { url: url.to_string(), summary }))
    }
}

/// Test double with a scripted outcome per attempt, counting attempts.
#[derive(Default)]
pub struct ScriptedProfileFetcher {
    outcomes: tokio::sync::Mutex<std::collections::VecDeque<Result<Option<ProfileSummary>, String>>>,
    pub attempts: std::sync::atomic::AtomicUsize,
}

impl ScriptedProfileFetcher {
    pub fn with_outcomes<I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = Result<Option<ProfileSummary>, String>>,
    {
        Self {
            outcomes: tokio::sync::Mutex::new(outcomes.into_iter().collect()),
            attempts: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn always_failing() -> Self {
        Self::default()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfileFetcher for ScriptedProfileFetcher {
    async fn fetch(&self, _url: &str) -> Result<Option<ProfileSummary>, FetchError> {
        self.attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        match self.outcomes.lock().await.pop_front() {
            Some(Ok(summary)) => Ok(summary),
            Some(Err(reason)) => Err(FetchError::Http(reason)),
            None => Err(FetchError::Http("scripted fetcher exhausted".to_string())),
        }
    }
}
