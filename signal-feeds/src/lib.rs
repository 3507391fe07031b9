//! Helpers that sit around the analysis pipeline
//!
//! - `preprocess`: article text cleaning and URL de-duplication
//! - `listings`: NASDAQ Trader symbol directories, used to regenerate the
//!   ticker snapshot the registry loads

pub mod error;
pub mod listings;
pub mod preprocess;

pub use error::FeedError;
pub use listings::ListingsClient;
pub use preprocess::{clean_text, dedupe_by_url, preprocess};
