pub mod extract;
pub mod fetcher;

pub use extract::product_document;
pub use fetcher::HttpProductFetcher;
