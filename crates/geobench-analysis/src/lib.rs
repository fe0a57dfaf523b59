//! Response analysis for the GEO benchmark.
//!
//! Turns raw engine answers into brand mentions and classified citations
//! ([`ResponseParser`]), then rolls a run's parsed responses up into one
//! metric row per (query, engine, brand) with a single resolved winner per
//! group ([`aggregate`]).

pub mod aggregator;
mod citations;
pub mod error;
pub mod lexicon;
mod matcher;
pub mod parser;
mod payload;
pub mod text;
pub mod winner;

pub use aggregator::aggregate;
pub use error::{AnalysisError, ParseError};
pub use lexicon::lexicon_score;
pub use parser::ResponseParser;
pub use winner::resolve_winner;

#[cfg(test)]
pub(crate) mod test_support {
    use geobench_core::{parse_brands, BrandsFile};

    const BRANDS_YAML: &str = r#"
brands:
  - key: on24
    display_name: ON24
    role: target
    aliases: ["on24", "on 24"]
    root_domains: ["on24.com", "www.on24.com"]
    excluded_domains: ["event.on24.com"]
  - key: goldcast
    display_name: Goldcast
    role: competitor
    aliases: ["goldcast", "gold cast"]
    root_domains: ["goldcast.io", "www.goldcast.io"]
  - key: zoom
    display_name: Zoom (Webinars/Events)
    role: competitor
    aliases: ["zoom webinars", "zoom webinar", "zoom events", "zoom"]
    root_domains: ["zoom.us", "www.zoom.us"]
    context_keywords: ["webinar", "virtual event", "event platform", "webcast", "zoom events"]
    exclude_phrases: ["zoom meetings", "zoom meeting", "video conferencing", "zoom phone", "zoom rooms"]
"#;

    pub(crate) fn brands() -> BrandsFile {
        parse_brands(BRANDS_YAML).expect("test brands are valid")
    }
}
