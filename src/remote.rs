//! Logs hosted on Google Drive or Dropbox.

use std::fmt;
use std::time::Duration;

use url::Url;

use crate::error::{AnalyzerError, Result};

const USER_AGENT: &str = concat!("fps-log-analyzer/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteSource {
    GoogleDrive { file_id: String },
    Dropbox { url: String },
}

impl fmt::Display for RemoteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteSource::GoogleDrive { file_id } => write!(f, "gdrive:{file_id}"),
            RemoteSource::Dropbox { url } => f.write_str(url),
        }
    }
}

fn bad_source(reason: String) -> AnalyzerError {
    AnalyzerError::InvalidShareUrl { reason }
}

impl RemoteSource {
    /// URL that serves the file body directly.
    pub fn direct_url(&self) -> Result<Url> {
        match self {
            RemoteSource::GoogleDrive { file_id } => {
                let valid = !file_id.is_empty()
                    && file_id
                        .bytes()
                        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
                if !valid {
                    return Err(bad_source(format!("invalid drive file id {file_id:?}")));
                }
                let mut url = Url::parse("https://drive.usercontent.google.com/u/0/uc")
                    .map_err(|e| bad_source(e.to_string()))?;
                url.query_pairs_mut()
                    .append_pair("id", file_id)
                    .append_pair("export", "download");
                Ok(url)
            }
            RemoteSource::Dropbox { url } => {
                let mut parsed = Url::parse(url).map_err(|e| bad_source(format!("{url}: {e}")))?;
                let pairs: Vec<(String, String)> = parsed
                    .query_pairs()
                    .filter(|(k, _)| k != "dl")
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect();
                parsed
                    .query_pairs_mut()
                    .clear()
                    .extend_pairs(pairs)
                    .append_pair("dl", "1");
                Ok(parsed)
            }
        }
    }
}

fn network(e: reqwest::Error) -> AnalyzerError {
    AnalyzerError::Network {
        message: e.to_string(),
    }
}

/// Download the log body as text. No retries.
pub fn fetch_text(source: &RemoteSource, timeout: Duration) -> Result<String> {
    let url = source.direct_url()?;
    tracing::info!(source = %source, url = %url, "fetching remote log");

    let client = reqwest::blocking::Client::builder()
        .redirect(reqwest::redirect::Policy::limited(5))
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(network)?;
    let response = client.get(url).send().map_err(network)?;

    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(AnalyzerError::RemoteNotFound {
            id: source.to_string(),
        });
    }
    if !status.is_success() {
        return Err(AnalyzerError::Network {
            message: format!("{source} returned {status}"),
        });
    }
    let body = response.text().map_err(network)?;
    tracing::debug!(bytes = body.len(), "fetched remote log");
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drive_direct_url() {
        let source = RemoteSource::GoogleDrive {
            file_id: "1AbC_d-9".to_string(),
        };
        assert_eq!(
            source.direct_url().unwrap().as_str(),
            "https://drive.usercontent.google.com/u/0/uc?id=1AbC_d-9&export=download"
        );
    }

    #[test]
    fn test_drive_rejects_odd_ids() {
        let source = RemoteSource::GoogleDrive {
            file_id: "../etc".to_string(),
        };
        assert!(source.direct_url().is_err());
    }

    #[test]
    fn test_dropbox_forces_download() {
        let source = RemoteSource::Dropbox {
            url: "https://www.dropbox.com/s/abc/bench.log?dl=0".to_string(),
        };
        assert_eq!(
            source.direct_url().unwrap().as_str(),
            "https://www.dropbox.com/s/abc/bench.log?dl=1"
        );

        let source = RemoteSource::Dropbox {
            url: "https://www.dropbox.com/scl/fi/xyz/bench.log?rlkey=k1".to_string(),
        };
        assert_eq!(
            source.direct_url().unwrap().as_str(),
            "https://www.dropbox.com/scl/fi/xyz/bench.log?rlkey=k1&dl=1"
        );
    }
}
