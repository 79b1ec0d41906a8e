//! Capability adapters: text Q&A, vision analysis, song search, image generation.

pub mod http;
pub mod traits;

pub use http::HttpContentProvider;
pub use traits::{ContentProvider, ProviderError};
