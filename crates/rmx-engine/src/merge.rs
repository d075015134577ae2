//! The reconciliation fold: authoritative ROAs + per-source routes in,
//! augmented ROA set out.

use std::collections::HashSet;
use std::fmt;

use ipnet::IpNet;
use rmx_model::{canonical_prefix, Roa, SourceMap};

use crate::trie::PrefixTrie;

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Coverage policy for registry routes that fall under an authoritative
/// prefix.
///
/// `Safe` drops them: an authoritative covering entry always wins, even when
/// the registry declares a different origin. `Unsafe` appends them anyway, so
/// both the authoritative and the synthesized entries coexist in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    #[default]
    Safe,
    Unsafe,
}

// ---------------------------------------------------------------------------
// Key
// ---------------------------------------------------------------------------

/// The dedup identity of an output entry: canonical prefix text plus ASN.
///
/// Seeded from the authoritative set and grown monotonically while folding;
/// a key is synthesized at most once, whichever source reaches it first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReconcileKey {
    pub prefix: String,
    pub asn: String,
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that abort a merge attempt.
///
/// There is no skip-one mode: a malformed authoritative prefix poisons the
/// whole attempt, because a partially indexed trie would silently weaken the
/// safe policy for every registry route it should have suppressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    /// An authoritative prefix could not be parsed as CIDR.
    BadPrefix { prefix: String, detail: String },
}

impl fmt::Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeError::BadPrefix { prefix, detail } => {
                write!(f, "bad prefix '{prefix}': {detail}")
            }
        }
    }
}

impl std::error::Error for MergeError {}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// Fold the registry SourceMap into the authoritative ROA set.
///
/// Every authoritative entry is carried into the output unmodified and in
/// input order. For each registry route, in source-label order then file
/// order:
///
/// 1. Its (canonical prefix, origin) key is checked against everything seen
///    so far (authoritative or already synthesized) and skipped if present.
/// 2. The key is burned either way, so the same declaration from any later
///    source is also skipped.
/// 3. Unless an authoritative prefix covers the route (equal or less
///    specific) under [`MergePolicy::Safe`], a ROA is synthesized with the
///    route's own mask length as `maxLength` and the source label as `ta`.
///
/// The output is NOT sorted; callers apply [`sort_canonical`] before
/// encoding.
pub fn merge(
    roas: &[Roa],
    sources: &SourceMap,
    policy: MergePolicy,
) -> Result<Vec<Roa>, MergeError> {
    let mut seen: HashSet<ReconcileKey> = HashSet::with_capacity(roas.len());
    let mut trie = PrefixTrie::new();

    for roa in roas {
        let net: IpNet = roa.prefix.parse().map_err(|e: ipnet::AddrParseError| {
            MergeError::BadPrefix {
                prefix: roa.prefix.clone(),
                detail: e.to_string(),
            }
        })?;
        trie.insert(&net);
        seen.insert(ReconcileKey {
            prefix: canonical_prefix(&net),
            asn: roa.asn.clone(),
        });
    }

    let mut out: Vec<Roa> = roas.to_vec();

    for (label, routes) in sources {
        for route in routes {
            let key = ReconcileKey {
                prefix: canonical_prefix(&route.prefix),
                asn: route.origin.clone(),
            };
            // `insert` returning false = the key was already present.
            if !seen.insert(key.clone()) {
                continue;
            }

            if policy == MergePolicy::Unsafe || !trie.covers(&route.prefix) {
                out.push(Roa::new(
                    key.prefix,
                    route.prefix.prefix_len(),
                    key.asn,
                    label.clone(),
                ));
            }
        }
    }

    Ok(out)
}

/// Stable sort by (ASN, maxLength, prefix, TA).
///
/// ASN ordering is string-lexicographic, like the export format itself;
/// identical inputs always yield byte-identical encoded output.
pub fn sort_canonical(roas: &mut [Roa]) {
    roas.sort_by(|a, b| {
        (&a.asn, a.max_length, &a.prefix, &a.ta).cmp(&(&b.asn, b.max_length, &b.prefix, &b.ta))
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rmx_model::Route;

    fn route(prefix: &str, origin: &str) -> Route {
        Route::new(prefix.parse().unwrap(), origin)
    }

    fn one_source(label: &str, routes: Vec<Route>) -> SourceMap {
        let mut m = SourceMap::new();
        m.insert(label.to_string(), routes);
        m
    }

    #[test]
    fn empty_source_map_returns_authoritative_unchanged() {
        let roas = vec![Roa::new("10.0.0.0/8", 8, "AS65000", "ARIN")];
        let out = merge(&roas, &SourceMap::new(), MergePolicy::Safe).unwrap();
        assert_eq!(out, roas);
    }

    #[test]
    fn uncovered_route_is_synthesized_with_source_label_as_ta() {
        let out = merge(
            &[],
            &one_source("radb", vec![route("192.0.2.0/24", "AS64500")]),
            MergePolicy::Safe,
        )
        .unwrap();
        assert_eq!(out, vec![Roa::new("192.0.2.0/24", 24, "AS64500", "radb")]);
    }

    #[test]
    fn covered_route_dropped_even_when_asn_differs() {
        let roas = vec![Roa::new("10.0.0.0/8", 8, "AS65000", "ARIN")];
        let out = merge(
            &roas,
            &one_source("radb", vec![route("10.0.0.0/16", "AS65001")]),
            MergePolicy::Safe,
        )
        .unwrap();
        assert_eq!(out, roas);
    }

    #[test]
    fn unsafe_policy_appends_covered_route() {
        let roas = vec![Roa::new("10.0.0.0/8", 8, "AS65000", "ARIN")];
        let out = merge(
            &roas,
            &one_source("radb", vec![route("10.0.0.0/16", "AS65001")]),
            MergePolicy::Unsafe,
        )
        .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], roas[0]);
        assert_eq!(out[1], Roa::new("10.0.0.0/16", 16, "AS65001", "radb"));
    }

    #[test]
    fn authoritative_key_suppresses_identical_registry_declaration() {
        // Same (prefix, asn) as the ROA: dedup, not coverage, removes it,
        // so it is absent even under the unsafe policy.
        let roas = vec![Roa::new("10.0.0.0/8", 8, "AS65000", "ARIN")];
        let out = merge(
            &roas,
            &one_source("radb", vec![route("10.0.0.0/8", "AS65000")]),
            MergePolicy::Unsafe,
        )
        .unwrap();
        assert_eq!(out, roas);
    }

    #[test]
    fn duplicate_route_within_one_source_synthesized_once() {
        let out = merge(
            &[],
            &one_source(
                "radb",
                vec![
                    route("198.51.100.0/24", "AS64501"),
                    route("198.51.100.0/24", "AS64501"),
                ],
            ),
            MergePolicy::Safe,
        )
        .unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn same_prefix_different_origins_both_synthesized() {
        let out = merge(
            &[],
            &one_source(
                "radb",
                vec![
                    route("198.51.100.0/24", "AS64501"),
                    route("198.51.100.0/24", "AS64502"),
                ],
            ),
            MergePolicy::Safe,
        )
        .unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn non_canonical_registry_prefix_dedups_against_authoritative() {
        let roas = vec![Roa::new("10.0.0.0/8", 8, "AS65000", "ARIN")];
        // Host bits set; canonicalizes to 10.0.0.0/8 and hits the seeded key.
        let out = merge(
            &roas,
            &one_source("radb", vec![route("10.7.7.7/8", "AS65000")]),
            MergePolicy::Unsafe,
        )
        .unwrap();
        assert_eq!(out, roas);
    }

    #[test]
    fn bad_authoritative_prefix_aborts_merge() {
        let roas = vec![Roa::new("not-a-prefix", 8, "AS65000", "ARIN")];
        let err = merge(&roas, &SourceMap::new(), MergePolicy::Safe).unwrap_err();
        let MergeError::BadPrefix { prefix, .. } = err;
        assert_eq!(prefix, "not-a-prefix");
    }

    #[test]
    fn v6_routes_fold_like_v4() {
        let roas = vec![Roa::new("2001:db8::/32", 32, "AS65000", "RIPE")];
        let out = merge(
            &roas,
            &one_source(
                "radb",
                vec![
                    route("2001:db8:1::/48", "AS65001"),
                    route("2001:db9::/32", "AS65002"),
                ],
            ),
            MergePolicy::Safe,
        )
        .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1], Roa::new("2001:db9::/32", 32, "AS65002", "radb"));
    }

    #[test]
    fn sort_canonical_orders_by_asn_then_len_then_prefix_then_ta() {
        let mut roas = vec![
            Roa::new("10.0.0.0/8", 8, "AS65001", "ARIN"),
            Roa::new("9.0.0.0/8", 8, "AS65000", "radb"),
            Roa::new("10.0.0.0/16", 16, "AS65000", "radb"),
            Roa::new("10.0.0.0/8", 8, "AS65000", "ARIN"),
            Roa::new("10.0.0.0/8", 8, "AS65000", "RIPE"),
        ];
        sort_canonical(&mut roas);
        assert_eq!(
            roas,
            vec![
                Roa::new("10.0.0.0/8", 8, "AS65000", "ARIN"),
                Roa::new("10.0.0.0/8", 8, "AS65000", "RIPE"),
                Roa::new("9.0.0.0/8", 8, "AS65000", "radb"),
                Roa::new("10.0.0.0/16", 16, "AS65000", "radb"),
                Roa::new("10.0.0.0/8", 8, "AS65001", "ARIN"),
            ]
        );
    }
}
