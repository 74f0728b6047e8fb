mod link_extract;
mod page_fetching;

pub use link_extract::{extract_links, PageLinks};
pub use page_fetching::{fetch_document, DocumentMeta, FetchError};
