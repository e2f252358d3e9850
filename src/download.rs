//! Fetching the generated file behind a download link

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use url::Url;

use crate::config::Config;
use crate::error::{ClientError, Result};

/// A result file written to disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub path: PathBuf,
    pub bytes: u64,
}

pub struct Downloader {
    client: reqwest::Client,
    output_dir: PathBuf,
    overwrite: bool,
}

impl Downloader {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.server.timeout())
            .connect_timeout(config.server.connect_timeout())
            .build()?;

        Ok(Self {
            client,
            output_dir: config.output.download_dir.clone(),
            overwrite: config.output.overwrite,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Download `link` into the output directory
    pub async fn fetch(&self, link: &str) -> Result<DownloadedFile> {
        let url = Url::parse(link)?;
        debug!("GET {}", url);

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let header_name = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(filename_from_disposition);

        let file_name = header_name
            .or_else(|| filename_from_url(&url))
            .ok_or_else(|| {
                ClientError::InvalidInput(format!("cannot derive a file name from {}", url))
            })?;

        let data = response.bytes().await?;

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(&file_name);
        let mut file = open_output(&path, self.overwrite).await?;
        file.write_all(&data).await?;
        file.flush().await?;
        info!("💾 Saved {} ({} bytes)", path.display(), data.len());

        Ok(DownloadedFile {
            path,
            bytes: data.len() as u64,
        })
    }
}

/// Open `path` for writing. Without `overwrite` the file must not exist yet;
/// the check and the create happen in one call.
async fn open_output(path: &Path, overwrite: bool) -> Result<File> {
    let mut options = OpenOptions::new();
    options.write(true);
    if overwrite {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }

    options.open(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::AlreadyExists => {
            ClientError::InvalidInput(format!("{} already exists", path.display()))
        }
        _ => ClientError::Io(e),
    })
}

fn disposition_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)filename\*?\s*=\s*(?:UTF-8'')?"?([^";]+)"?"#)
            .expect("Content-Disposition pattern is valid")
    })
}

/// File name from a `Content-Disposition` header value
pub fn filename_from_disposition(header: &str) -> Option<String> {
    let raw = disposition_regex().captures(header)?.get(1)?.as_str().trim();
    let decoded = urlencoding::decode(raw).ok()?;
    safe_file_name(&decoded)
}

/// File name from the last path segment of a download URL. The service
/// prefixes stored names with a tag ending in `_`; the part after the
/// first `_` is the name it presents to users.
pub fn filename_from_url(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let decoded = urlencoding::decode(segment).ok()?;
    let presented = decoded
        .split_once('_')
        .map(|(_, rest)| rest)
        .filter(|rest| !rest.is_empty())
        .unwrap_or(&*decoded);
    safe_file_name(presented)
}

/// Keep only the final path component so a name cannot escape the output dir
fn safe_file_name(name: &str) -> Option<String> {
    let name = name.rsplit(['/', '\\']).next()?.trim();
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name.to_string())
}
