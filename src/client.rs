//! HTTP client for the ClassCraft service

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Config;
use crate::error::{ClientError, Result};
use crate::form::SelectedFile;
use crate::progress::ProgressReporter;

/// Successful response body. Both endpoints answer with the same shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerResponse {
    pub download_url: Option<String>,
    pub original_filename: Option<String>,
}

impl ServerResponse {
    pub fn with_download_url(url: impl Into<String>) -> Self {
        Self {
            download_url: Some(url.into()),
            original_filename: None,
        }
    }

    /// Read a success body leniently. Anything that is not an object with a
    /// non-empty string `download_url` yields a response without a link.
    pub fn from_body(body: &str) -> Self {
        let value: serde_json::Value = match serde_json::from_str(body) {
            Ok(value) => value,
            Err(e) => {
                debug!("Success body is not JSON: {}", e);
                return Self::default();
            }
        };

        let field = |name: &str| {
            value
                .get(name)
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Self {
            download_url: field("download_url"),
            original_filename: field("original_filename"),
        }
    }

    pub fn download_link(&self) -> Option<&str> {
        self.download_url.as_deref()
    }
}

#[derive(Debug, Deserialize)]
struct ServerErrorBody {
    error: String,
}

/// Trait for the ClassCraft service
#[async_trait]
pub trait ClassCraftApi: Send + Sync {
    /// Sort students into `num_classes` classes
    async fn process(
        &self,
        file: &SelectedFile,
        num_classes: i64,
        progress: ProgressReporter,
    ) -> Result<ServerResponse>;

    /// Add a MAP_score column
    async fn calculate(
        &self,
        file: &SelectedFile,
        progress: ProgressReporter,
    ) -> Result<ServerResponse>;
}

/// reqwest-backed implementation
pub struct HttpClient {
    config: Config,
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(config: Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.server.timeout())
            .connect_timeout(config.server.connect_timeout())
            .build()?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build the file part as a chunked stream so each chunk handed to the
    /// transport advances the reporter
    async fn file_part(&self, file: &SelectedFile, progress: ProgressReporter) -> Result<Part> {
        let data = file.read().await?;
        let total = data.len() as u64;
        progress.set_total(total);

        let chunk_size = self.config.upload.chunk_size.max(1);
        let chunks: Vec<Vec<u8>> = data.chunks(chunk_size).map(<[u8]>::to_vec).collect();
        let stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
            progress.advance(chunk.len() as u64);
            Ok::<_, std::io::Error>(chunk)
        }));

        let part = Part::stream_with_length(reqwest::Body::wrap_stream(stream), total)
            .file_name(file.file_name().to_string())
            .mime_str(&self.config.upload.mime_type)?;

        Ok(part)
    }

    async fn post_form(&self, url: Url, form: Form) -> Result<ServerResponse> {
        debug!("POST {}", url);
        let response = self.client.post(url.clone()).multipart(form).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ServerErrorBody>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            warn!("{} answered {}: {}", url, status, message);
            return Err(ClientError::Server {
                status: status.as_u16(),
                message,
            });
        }

        Ok(ServerResponse::from_body(&body))
    }
}

#[async_trait]
impl ClassCraftApi for HttpClient {
    async fn process(
        &self,
        file: &SelectedFile,
        num_classes: i64,
        progress: ProgressReporter,
    ) -> Result<ServerResponse> {
        let url = self.config.server.endpoint(&self.config.server.process_path)?;
        info!("📤 Uploading {} for sorting into {} classes", file.file_name(), num_classes);

        let form = Form::new()
            .text("num_classes", num_classes.to_string())
            .part("file", self.file_part(file, progress).await?);

        self.post_form(url, form).await
    }

    async fn calculate(
        &self,
        file: &SelectedFile,
        progress: ProgressReporter,
    ) -> Result<ServerResponse> {
        let url = self.config.server.endpoint(&self.config.server.calculate_path)?;
        info!("📤 Uploading {} for MAP score calculation", file.file_name());

        let form = Form::new().part("file", self.file_part(file, progress).await?);

        self.post_form(url, form).await
    }
}
