//! rmx-engine
//!
//! The reconciliation core: fold registry-declared routes into an
//! authoritative ROA set.
//!
//! Architectural decisions:
//! - Authoritative entries pass through unmodified, always.
//! - A (prefix, ASN) key is synthesized at most once; first occurrence wins.
//! - Under the safe policy, any covering authoritative prefix suppresses a
//!   registry route, ASN match or not.
//! - A malformed prefix aborts the whole merge, never skips one entry.
//!
//! Deterministic, pure logic. No I/O. No fetching. No clocks.

mod merge;
mod trie;

pub use merge::{merge, sort_canonical, MergeError, MergePolicy, ReconcileKey};
pub use trie::PrefixTrie;
