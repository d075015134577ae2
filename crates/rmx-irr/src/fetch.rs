//! Transports for registry dumps: local files, HTTP(S) and FTP mirrors,
//! with transparent gunzip for `.gz` locations.

use std::fmt;
use std::io::Read;

use flate2::read::GzDecoder;
use rmx_model::Route;

use crate::parse::{parse_routes, ParseError};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors raised while fetching one source. Any variant is fatal for that
/// source; the acquisition layer decides what it means for the round.
#[derive(Debug)]
pub enum FetchError {
    /// Local file could not be read.
    Io { src: String, detail: String },
    /// The source location is not a parseable URL.
    BadUrl { src: String, detail: String },
    /// Network-level failure talking to the mirror.
    Transport { src: String, detail: String },
    /// The mirror answered with a non-success HTTP status.
    Status { src: String, status: u16 },
    /// FTP dial, login or retrieval failure.
    Ftp { src: String, detail: String },
    /// URL scheme this crate does not speak.
    UnknownScheme { src: String },
    /// A `.gz` body that does not decompress.
    Gunzip { src: String, detail: String },
    /// The body fetched fine but is not a valid dump.
    Parse { src: String, err: ParseError },
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Io { src, detail } => write!(f, "read '{src}': {detail}"),
            FetchError::BadUrl { src, detail } => write!(f, "bad url '{src}': {detail}"),
            FetchError::Transport { src, detail } => write!(f, "fetch '{src}': {detail}"),
            FetchError::Status { src, status } => {
                write!(f, "fetch '{src}': http status {status}")
            }
            FetchError::Ftp { src, detail } => write!(f, "ftp '{src}': {detail}"),
            FetchError::UnknownScheme { src } => write!(f, "unknown scheme: '{src}'"),
            FetchError::Gunzip { src, detail } => write!(f, "gunzip '{src}': {detail}"),
            FetchError::Parse { src, err } => write!(f, "parse '{src}': {err}"),
        }
    }
}

impl std::error::Error for FetchError {}

// ---------------------------------------------------------------------------
// Source trait
// ---------------------------------------------------------------------------

/// One configured registry source.
///
/// Object-safe so the acquisition layer can fan out over a mixed
/// `Vec<Box<dyn RouteSource>>` of files and URLs.
#[async_trait::async_trait]
pub trait RouteSource: Send + Sync {
    /// The key this source's routes land under in the SourceMap. By
    /// convention the configured location string itself.
    fn label(&self) -> &str;

    /// Fetch and parse the dump. Route order follows the dump.
    async fn fetch_routes(&self) -> Result<Vec<Route>, FetchError>;
}

// ---------------------------------------------------------------------------
// File source
// ---------------------------------------------------------------------------

/// A dump on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: String,
}

impl FileSource {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl RouteSource for FileSource {
    fn label(&self) -> &str {
        &self.path
    }

    async fn fetch_routes(&self) -> Result<Vec<Route>, FetchError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| FetchError::Io {
                src: self.path.clone(),
                detail: e.to_string(),
            })?;
        decode_body(&bytes, &self.path)
    }
}

// ---------------------------------------------------------------------------
// URL source
// ---------------------------------------------------------------------------

/// A dump on a remote mirror: `http://`, `https://` or `ftp://`.
#[derive(Debug, Clone)]
pub struct UrlSource {
    url: String,
    client: reqwest::Client,
}

impl UrlSource {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }

    async fn fetch_http(&self) -> Result<Vec<u8>, FetchError> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                src: self.url.clone(),
                detail: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                src: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let body = resp.bytes().await.map_err(|e| FetchError::Transport {
            src: self.url.clone(),
            detail: e.to_string(),
        })?;
        Ok(body.to_vec())
    }

    /// The FTP client is synchronous, so the whole retrieval runs on the
    /// blocking pool.
    async fn fetch_ftp(&self, url: &reqwest::Url) -> Result<Vec<u8>, FetchError> {
        fn ftp_err(src: &str, e: &dyn fmt::Display) -> FetchError {
            FetchError::Ftp {
                src: src.to_string(),
                detail: e.to_string(),
            }
        }

        let host = url
            .host_str()
            .ok_or_else(|| FetchError::BadUrl {
                src: self.url.clone(),
                detail: "missing host".to_string(),
            })?
            .to_string();
        let port = url.port().unwrap_or(21);
        let path = url.path().to_string();
        let src = self.url.clone();

        let body = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, FetchError> {
            let mut conn = suppaftp::FtpStream::connect((host.as_str(), port))
                .map_err(|e| ftp_err(&src, &e))?;
            conn.login("anonymous", "anonymous")
                .map_err(|e| ftp_err(&src, &e))?;
            let buf = conn.retr_as_buffer(&path).map_err(|e| ftp_err(&src, &e))?;
            let _ = conn.quit();
            Ok(buf.into_inner())
        })
        .await
        .map_err(|e| ftp_err(&self.url, &e))??;

        Ok(body)
    }
}

#[async_trait::async_trait]
impl RouteSource for UrlSource {
    fn label(&self) -> &str {
        &self.url
    }

    async fn fetch_routes(&self) -> Result<Vec<Route>, FetchError> {
        let parsed = reqwest::Url::parse(&self.url).map_err(|e| FetchError::BadUrl {
            src: self.url.clone(),
            detail: e.to_string(),
        })?;

        let body = match parsed.scheme() {
            "http" | "https" => self.fetch_http().await?,
            "ftp" => self.fetch_ftp(&parsed).await?,
            _ => {
                return Err(FetchError::UnknownScheme {
                    src: self.url.clone(),
                })
            }
        };

        decode_body(&body, &self.url)
    }
}

// ---------------------------------------------------------------------------
// Body decoding
// ---------------------------------------------------------------------------

/// Gunzip when the location says so, then parse.
///
/// Registry dumps are ASCII with the odd stray latin-1 byte in free-text
/// attributes; those decode lossily rather than failing the source.
pub(crate) fn decode_body(bytes: &[u8], src: &str) -> Result<Vec<Route>, FetchError> {
    let text = if src.ends_with(".gz") {
        let mut plain = Vec::new();
        GzDecoder::new(bytes)
            .read_to_end(&mut plain)
            .map_err(|e| FetchError::Gunzip {
                src: src.to_string(),
                detail: e.to_string(),
            })?;
        String::from_utf8_lossy(&plain).into_owned()
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    };

    parse_routes(&text).map_err(|err| FetchError::Parse {
        src: src.to_string(),
        err,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
