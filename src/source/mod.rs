//! Remote session sources
//!
//! A source hands out raw listening-session records one page at a time,
//! newest first. Records stay as untyped JSON here; decoding happens once in
//! the normalizer so a malformed record only fails itself.

mod abs;

pub use abs::AbsSessionSource;

use serde_json::Value;

use crate::error::SourceError;

/// Paginated listing of raw session records
pub trait SessionSource {
    /// Fetch one page. An empty page means the history is exhausted.
    fn fetch_page(&mut self, page: u32, page_size: u32) -> Result<Vec<Value>, SourceError>;
}

impl<S: SessionSource + ?Sized> SessionSource for &mut S {
    fn fetch_page(&mut self, page: u32, page_size: u32) -> Result<Vec<Value>, SourceError> {
        (**self).fetch_page(page, page_size)
    }
}
