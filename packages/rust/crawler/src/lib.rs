//! Homepage fetching and visible-text extraction.
//!
//! This crate provides:
//! - [`ContentFetcher`]: the URL → page text seam used by the pipeline
//! - [`HttpFetcher`]: the `reqwest` + `scraper` implementation
//! - [`extract`]: chrome stripping and whitespace cleanup

pub mod extract;
pub mod fetcher;

pub use extract::{clean_text, extract_visible_text, page_text};
pub use fetcher::{
    ContentFetcher, FetchFailure, FetchOutcome, HttpFetcher, normalize_url, scrape_all,
};
