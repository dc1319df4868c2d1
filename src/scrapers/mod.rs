//! Concrete source and enrichment capabilities backed by HTTP.

pub mod blog;
pub mod transcript;
pub mod youtube;

pub use blog::BlogScraper;
pub use transcript::YouTubeTranscripts;
pub use youtube::YouTubeScraper;
