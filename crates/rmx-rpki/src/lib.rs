//! Fetches the authoritative validated-ROA export from a validator's HTTP
//! endpoint.

use std::fmt;

use rmx_model::{Roa, RoaExport};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors fetching or decoding the authoritative export.
#[derive(Debug)]
pub enum RpkiError {
    /// Network-level failure talking to the validator.
    Transport { src: String, detail: String },
    /// The validator answered with a non-success HTTP status.
    Status { src: String, status: u16 },
    /// The body is not a valid export document.
    Decode { src: String, detail: String },
}

impl fmt::Display for RpkiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpkiError::Transport { src, detail } => write!(f, "fetch '{src}': {detail}"),
            RpkiError::Status { src, status } => {
                write!(f, "fetch '{src}': http status {status}")
            }
            RpkiError::Decode { src, detail } => write!(f, "decode '{src}': {detail}"),
        }
    }
}

impl std::error::Error for RpkiError {}

// ---------------------------------------------------------------------------
// Fetch
// ---------------------------------------------------------------------------

/// GET the export document at `url` and return its ROAs in document order.
///
/// An export without a `roas` key decodes as empty rather than failing;
/// some validators emit that while still warming up.
pub async fn fetch_export(client: &reqwest::Client, url: &str) -> Result<Vec<Roa>, RpkiError> {
    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| RpkiError::Transport {
            src: url.to_string(),
            detail: e.to_string(),
        })?;

    let status = resp.status();
    if !status.is_success() {
        return Err(RpkiError::Status {
            src: url.to_string(),
            status: status.as_u16(),
        });
    }

    let export: RoaExport = resp.json().await.map_err(|e| RpkiError::Decode {
        src: url.to_string(),
        detail: e.to_string(),
    })?;

    Ok(export.roas)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
