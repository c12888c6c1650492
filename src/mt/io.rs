//! Item sources and result sinks
//!
//! The engine itself never touches files or the network for its input and
//! output; these collaborators do. Failures here are fatal for the run.

use crate::mt::data::{TranslationItem, TranslationResult};
use crate::mt::error::{MtError, MtResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where the items of a run come from
#[async_trait]
pub trait ItemSource: Send + Sync {
    async fn fetch_items(&self) -> MtResult<Vec<TranslationItem>>;

    /// Human-readable origin for logs
    fn describe(&self) -> String;
}

/// Where the results of a run go
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn persist(&self, results: &[TranslationResult]) -> MtResult<()>;
}

/// A local JSON array of `{title, content}` objects
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ItemSource for JsonFileSource {
    async fn fetch_items(&self) -> MtResult<Vec<TranslationItem>> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            MtError::SourceError(format!("Cannot read {}: {}", self.path.display(), e))
        })?;
        let items: Vec<TranslationItem> = serde_json::from_str(&raw).map_err(|e| {
            MtError::SourceError(format!("Invalid items in {}: {}", self.path.display(), e))
        })?;
        debug!(path = %self.path.display(), items = items.len(), "items loaded");
        Ok(items)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// A JSON array of items served over HTTP
#[derive(Debug, Clone)]
pub struct HttpJsonSource {
    client: reqwest::Client,
    url: String,
}

impl HttpJsonSource {
    pub fn new(url: impl Into<String>) -> MtResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| MtError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ItemSource for HttpJsonSource {
    async fn fetch_items(&self) -> MtResult<Vec<TranslationItem>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| MtError::SourceError(format!("GET {} failed: {}", self.url, e)))?;

        if !response.status().is_success() {
            return Err(MtError::SourceError(format!(
                "GET {} returned {}",
                self.url,
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| MtError::SourceError(format!("Reading {} failed: {}", self.url, e)))?;
        serde_json::from_str(&body)
            .map_err(|e| MtError::SourceError(format!("Invalid items from {}: {}", self.url, e)))
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Pretty JSON array of results, replaced atomically on each persist
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

#[async_trait]
impl ResultSink for JsonFileSink {
    async fn persist(&self, results: &[TranslationResult]) -> MtResult<()> {
        let persist_err = |e: std::io::Error| {
            MtError::PersistError(format!("Cannot write {}: {}", self.path.display(), e))
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(persist_err)?;
        }

        let json = serde_json::to_string_pretty(results)
            .map_err(|e| MtError::PersistError(e.to_string()))?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, json).await.map_err(persist_err)?;
        tokio::fs::rename(&temp, &self.path).await.map_err(persist_err)?;

        info!(path = %self.path.display(), results = results.len(), "results written");
        Ok(())
    }
}

/// Read the results of an earlier run; a missing file means nothing to resume
pub async fn load_previous_results(path: &Path) -> MtResult<Vec<TranslationResult>> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
            MtError::SourceError(format!("Invalid previous results in {}: {}", path.display(), e))
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(MtError::SourceError(format!(
            "Cannot read {}: {}",
            path.display(),
            e
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("cascade-translate-{}-{}", std::process::id(), name))
    }

    #[tokio::test]
    async fn test_file_source_reads_items() {
        let path = scratch("items.json");
        tokio::fs::write(&path, r#"[{"title":"甲","content":"你好。世界！"}]"#)
            .await
            .unwrap();

        let items = JsonFileSource::new(&path).fetch_items().await.unwrap();
        assert_eq!(items, vec![TranslationItem::new("甲", "你好。世界！")]);

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_file_source_missing_file() {
        let err = JsonFileSource::new(scratch("absent.json"))
            .fetch_items()
            .await
            .unwrap_err();
        assert!(matches!(err, MtError::SourceError(_)));
    }

    #[tokio::test]
    async fn test_file_source_invalid_json() {
        let path = scratch("broken.json");
        tokio::fs::write(&path, "{not json").await.unwrap();
        let err = JsonFileSource::new(&path).fetch_items().await.unwrap_err();
        assert!(matches!(err, MtError::SourceError(_)));
        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_http_source_unreachable() {
        let source = HttpJsonSource::new("http://127.0.0.1:9/items.json").unwrap();
        let err = source.fetch_items().await.unwrap_err();
        assert!(matches!(err, MtError::SourceError(_)));
        assert_eq!(source.describe(), "http://127.0.0.1:9/items.json");
    }

    #[tokio::test]
    async fn test_sink_writes_and_resume_reads_back() {
        let path = scratch("out").join("results.json");
        let results = vec![TranslationResult {
            title: "Jia".into(),
            content: "Hello. World!".into(),
            translated: true,
            model: "mock".into(),
            error: None,
        }];

        let sink = JsonFileSink::new(&path);
        sink.persist(&results).await.unwrap();
        assert!(!sink.temp_path().exists());

        let loaded = load_previous_results(&path).await.unwrap();
        assert_eq!(loaded, results);

        tokio::fs::remove_dir_all(scratch("out")).await.unwrap();
    }

    #[tokio::test]
    async fn test_previous_results_missing_is_empty() {
        let loaded = load_previous_results(&scratch("never-written.json")).await.unwrap();
        assert!(loaded.is_empty());
    }
}
