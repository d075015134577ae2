//! Registry source ingestion: dump parsing, transports, and the concurrent
//! acquisition round.
//!
//! The crate is deliberately split along those three seams: `parse` is pure
//! text handling, `fetch` speaks the transports one source at a time, and
//! `acquire` owns the all-or-nothing fan-out across every configured source.

pub mod acquire;
pub mod fetch;
pub mod parse;

pub use acquire::{acquire_sources, build_sources, AcquireError};
pub use fetch::{FetchError, FileSource, RouteSource, UrlSource};
pub use parse::{parse_routes, ParseError};
