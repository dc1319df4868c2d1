//! Multi-source content aggregation: fan out to configured video channels and
//! blog listings, enrich videos with transcripts, build a run report, and
//! persist new items into a deduplicated store.

pub mod config;
pub mod db;
pub mod enrich;
pub mod http;
pub mod model;
pub mod orchestrator;
pub mod persist;
pub mod report;
pub mod scrapers;
pub mod source;
