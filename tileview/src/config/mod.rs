//! Engine configuration.
//!
//! Loaded from an INI file:
//!
//! ```ini
//! [provider]
//! kind = xyz-template
//! name = osm
//! url_template = https://{s}.tile.example.org/{z}/{x}/{y}.png
//! subdomains = a,b,c
//!
//! [fetch]
//! latency_budget = 0      ; ms: >0 bounded, 0 default (30s), <0 unbounded
//! concurrency = 8
//!
//! [region]
//! debounce = 150ms
//!
//! [cache]
//! purge_interval = 5m
//!
//! [cache.memory]          ; tiers are chained in file order
//! max_size = 256MB
//! retention = 1h
//!
//! [cache.disk]
//! storage = disk
//! directory = ~/.cache/tileview
//! max_size = 2GB
//! retention = 7d
//! ```

mod file;
mod parser;
mod settings;
mod size;

pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    CacheSettings, EngineConfig, FetchSettings, RegionSettings, DEFAULT_FETCH_CONCURRENCY,
};
pub use size::{format_size, parse_duration, parse_size, DurationParseError, SizeParseError};
