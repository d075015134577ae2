//! Line-oriented parser for registry database dumps.
//!
//! A dump is a stream of whitespace-keyed attribute lines grouped into
//! stanzas by blank lines. Only two attributes matter here: `route:` /
//! `route6:` opens a record, `origin:` closes it. Everything else
//! (`descr:`, `mnt-by:`, `source:`, ...) is skipped.

use std::fmt;

use ipnet::IpNet;
use rmx_model::Route;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors produced while parsing a registry dump. All carry the 1-based
/// line number they were raised at; any error is fatal for the whole source.
#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    /// A `route:`/`route6:` line with a bad field count or unparseable CIDR.
    BadRoute { line: usize, text: String },
    /// An `origin:` line with a bad field count for the pending route.
    BadOrigin { line: usize, prefix: String },
    /// A blank line hit while a route was still waiting for its origin.
    UnterminatedRecord { line: usize, prefix: String },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::BadRoute { line, text } => {
                write!(f, "line {line}: bad route line '{text}'")
            }
            ParseError::BadOrigin { line, prefix } => {
                write!(f, "line {line}: bad origin line for route {prefix}")
            }
            ParseError::UnterminatedRecord { line, prefix } => {
                write!(f, "line {line}: route {prefix} has no origin")
            }
        }
    }
}

impl std::error::Error for ParseError {}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse a registry dump into routes, in file order.
///
/// Grammar, per stanza:
///
/// - `route:` / `route6:` (keys are case-insensitive) with exactly one CIDR
///   field opens a record. A later `route:` before the origin replaces the
///   pending prefix. Host bits are masked off, so `10.1.2.3/8` records as
///   `10.0.0.0/8`.
/// - `origin:` with a pending route closes the record. Exactly two fields,
///   or more when the third starts with `#` (trailing comment).
/// - `origin:` with NO pending route is skipped: some historic mirrors
///   mangle the `route:` key itself, leaving orphan origins behind.
/// - A record still pending at a blank line is an error; a record still
///   pending at EOF is silently dropped.
pub fn parse_routes(input: &str) -> Result<Vec<Route>, ParseError> {
    let mut routes = Vec::new();
    let mut pending: Option<IpNet> = None;

    for (idx, raw) in input.lines().enumerate() {
        let line = idx + 1;
        let f: Vec<&str> = raw.split_whitespace().collect();

        // stanza separator
        if f.is_empty() {
            if let Some(prefix) = pending.take() {
                return Err(ParseError::UnterminatedRecord {
                    line,
                    prefix: prefix.to_string(),
                });
            }
            continue;
        }

        match f[0].to_ascii_lowercase().as_str() {
            "route:" | "route6:" => {
                if f.len() != 2 {
                    return Err(ParseError::BadRoute {
                        line,
                        text: raw.to_string(),
                    });
                }
                let net: IpNet = f[1].parse().map_err(|_| ParseError::BadRoute {
                    line,
                    text: raw.to_string(),
                })?;
                pending = Some(net.trunc());
            }
            "origin:" => {
                let Some(prefix) = pending else {
                    continue;
                };
                if f.len() != 2 && !(f.len() > 2 && f[2].starts_with('#')) {
                    return Err(ParseError::BadOrigin {
                        line,
                        prefix: prefix.to_string(),
                    });
                }
                routes.push(Route::new(prefix, f[1]));
                pending = None;
            }
            _ => {}
        }
    }

    Ok(routes)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
