//! rmx-model
//!
//! Shared value types for routes, ROAs and the export document.
//!
//! Pure data: no I/O, no async, no policy. The reconciliation rules live in
//! `rmx-engine`; fetching and parsing live in `rmx-irr` / `rmx-rpki`.

use std::collections::BTreeMap;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Route
// ---------------------------------------------------------------------------

/// A registry-declared route object: a prefix and the AS that claims to
/// originate it.
///
/// The origin is kept as the identifier text exactly as parsed (e.g.
/// `"AS65001"`); no numeric normalization happens at this boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub prefix: IpNet,
    pub origin: String,
}

impl Route {
    pub fn new(prefix: IpNet, origin: impl Into<String>) -> Self {
        Self {
            prefix,
            origin: origin.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Roa
// ---------------------------------------------------------------------------

/// One Route Origin Authorization entry of the export document.
///
/// `prefix` stays textual here: authoritative entries must round-trip through
/// the merge byte-for-byte, and the wire shape is text anyway. `ta` names the
/// trust anchor for authoritative entries and the source label for
/// synthesized ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roa {
    pub prefix: String,
    #[serde(rename = "maxLength")]
    pub max_length: u8,
    pub asn: String,
    pub ta: String,
}

impl Roa {
    pub fn new(
        prefix: impl Into<String>,
        max_length: u8,
        asn: impl Into<String>,
        ta: impl Into<String>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            max_length,
            asn: asn.into(),
            ta: ta.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// RoaExport
// ---------------------------------------------------------------------------

/// The export document: `{"roas": [...]}`.
///
/// This is both the authoritative input shape and the output shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoaExport {
    #[serde(default)]
    pub roas: Vec<Roa>,
}

impl RoaExport {
    pub fn new(roas: Vec<Roa>) -> Self {
        Self { roas }
    }

    /// Compact single-line JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Pretty JSON with tab indentation, the historical export format.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        use serde::ser::Error as _;

        let mut buf = Vec::new();
        let fmt = serde_json::ser::PrettyFormatter::with_indent(b"\t");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, fmt);
        self.serialize(&mut ser)?;
        String::from_utf8(buf).map_err(serde_json::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// SourceMap
// ---------------------------------------------------------------------------

/// Routes keyed by source label, one entry per configured source.
///
/// BTreeMap so consumers fold sources in a stable label order; when two
/// sources contend for the same (prefix, origin) key, which label ends up on
/// the synthesized entry must not depend on map iteration order.
pub type SourceMap = BTreeMap<String, Vec<Route>>;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Canonical prefix text: host bits zeroed, `Display` form.
///
/// `"10.1.2.3/8"` and `"10.0.0.0/8"` both canonicalize to `"10.0.0.0/8"`, so
/// dedup keys built from parsed prefixes and from export text agree.
pub fn canonical_prefix(net: &IpNet) -> String {
    net.trunc().to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
