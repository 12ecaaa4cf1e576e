//! Feed fetching and dialect-aware parsing.
//!
//! The fetch stage fans out one task per active source ([`fetch_all`]), each
//! performing a bounded-timeout GET ([`fetcher`]) followed by dialect-specific
//! parsing and date normalization ([`parser`]). Failures degrade to empty
//! per-source results; nothing here aborts a round.

mod fetcher;
mod parser;

pub use fetcher::{fetch_all, FetchError, SourceFetch, FETCH_TIMEOUT, NAMED_IDENTITY};
pub use parser::{parse_document, ParseError, ParsedFeed, MAX_TITLE_CHARS};
