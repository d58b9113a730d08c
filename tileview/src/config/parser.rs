//! INI parsing: `Ini` → `EngineConfig`.
//!
//! This is the single place where INI key names are mapped to struct fields.
//! Parsing starts from [`EngineConfig::default`] and overlays every value
//! present in the file.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};

use super::file::ConfigFileError;
use super::settings::EngineConfig;
use super::size::{parse_duration, parse_size};
use crate::cache::{default_disk_directory, CacheTierConfig, TierStorage};

const CACHE_TIER_PREFIX: &str = "cache.";
const HEADER_PREFIX: &str = "header.";

/// Values meaning "no limit" for sizes, counts and durations.
const UNLIMITED: &[&str] = &["", "0", "none", "unlimited", "off"];

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn is_unlimited(value: &str) -> bool {
    UNLIMITED.contains(&value.trim().to_ascii_lowercase().as_str())
}

/// Non-empty trimmed value of `key`.
fn text<'a>(props: &'a Properties, key: &str) -> Option<&'a str> {
    props.get(key).map(str::trim).filter(|v| !v.is_empty())
}

fn number<T: FromStr>(
    props: &Properties,
    section: &str,
    key: &str,
    reason: &str,
) -> Result<Option<T>, ConfigFileError> {
    match props.get(key) {
        Some(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(section, key, v, reason)),
        None => Ok(None),
    }
}

fn boolean(props: &Properties, section: &str, key: &str) -> Result<Option<bool>, ConfigFileError> {
    let Some(v) = props.get(key) else {
        return Ok(None);
    };
    match v.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(Some(true)),
        "false" | "no" | "off" | "0" => Ok(Some(false)),
        _ => Err(invalid(section, key, v, "must be true or false")),
    }
}

/// Size in bytes as a signed quota; unlimited values become `0`.
fn size_quota(props: &Properties, section: &str, key: &str) -> Result<Option<i64>, ConfigFileError> {
    let Some(v) = props.get(key) else {
        return Ok(None);
    };
    if is_unlimited(v) {
        return Ok(Some(0));
    }
    parse_size(v)
        .ok()
        .and_then(|bytes| i64::try_from(bytes).ok())
        .map(Some)
        .ok_or_else(|| invalid(section, key, v, "expected format like '64MB', '2GB', or 'unlimited'"))
}

/// Duration where unlimited values become `None`.
fn optional_duration(
    props: &Properties,
    section: &str,
    key: &str,
) -> Result<Option<Option<Duration>>, ConfigFileError> {
    let Some(v) = props.get(key) else {
        return Ok(None);
    };
    if is_unlimited(v) {
        return Ok(Some(None));
    }
    parse_duration(v)
        .map(|d| Some(Some(d)))
        .map_err(|e| invalid(section, key, v, &e.to_string()))
}

pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Parses an `Ini` document into an [`EngineConfig`].
pub(super) fn parse_ini(ini: &Ini) -> Result<EngineConfig, ConfigFileError> {
    let mut config = EngineConfig::default();

    if let Some(props) = ini.section(Some("provider")) {
        parse_provider(props, &mut config)?;
    }

    if let Some(props) = ini.section(Some("fetch")) {
        const SECTION: &str = "fetch";
        if let Some(v) = number(props, SECTION, "latency_budget", "must be an integer (milliseconds)")? {
            config.fetch.latency_budget_ms = v;
        }
        if let Some(v) = number::<usize>(props, SECTION, "concurrency", "must be a positive integer")? {
            if v == 0 {
                return Err(invalid(SECTION, "concurrency", "0", "must be a positive integer"));
            }
            config.fetch.concurrency = v;
        }
        if let Some(v) = text(props, "user_agent") {
            config.fetch.user_agent = v.to_string();
        }
    }

    if let Some(props) = ini.section(Some("region")) {
        if let Some(v) = props.get("debounce") {
            config.region.debounce =
                parse_duration(v).map_err(|e| invalid("region", "debounce", v, &e.to_string()))?;
        }
    }

    if let Some(props) = ini.section(Some("cache")) {
        if let Some(v) = optional_duration(props, "cache", "purge_interval")? {
            config.cache.purge_interval = v;
        }
    }

    let tiers = ini
        .iter()
        .filter_map(|(name, props)| {
            name.and_then(|n| n.strip_prefix(CACHE_TIER_PREFIX))
                .map(|tier| (tier, props))
        })
        .map(|(tier, props)| parse_cache_tier(tier, props))
        .collect::<Result<Vec<_>, _>>()?;
    if !tiers.is_empty() {
        config.cache.tiers = tiers;
    }

    Ok(config)
}

fn parse_provider(props: &Properties, config: &mut EngineConfig) -> Result<(), ConfigFileError> {
    const SECTION: &str = "provider";
    let provider = &mut config.provider;

    if let Some(v) = text(props, "kind") {
        provider.kind = v.to_ascii_lowercase();
    }
    if let Some(v) = text(props, "name") {
        provider.name = v.to_string();
    }
    if let Some(v) = text(props, "url_template") {
        provider.url_template = v.to_string();
    }
    if let Some(v) = text(props, "subdomains") {
        provider.subdomains = v
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some(v) = number(props, SECTION, "min_scale", "must be an integer")? {
        provider.min_scale = v;
    }
    if let Some(v) = number(props, SECTION, "max_scale", "must be an integer")? {
        provider.max_scale = v;
    }
    if let Some(v) = number::<u32>(props, SECTION, "tile_size", "must be a positive integer (pixels)")? {
        if v == 0 {
            return Err(invalid(SECTION, "tile_size", "0", "must be a positive integer (pixels)"));
        }
        provider.tile_size = v;
    }
    for (key, field) in [
        ("min_lat", &mut provider.min_lat),
        ("max_lat", &mut provider.max_lat),
        ("min_long", &mut provider.min_long),
        ("max_long", &mut provider.max_long),
    ] {
        if let Some(v) = number::<f64>(props, SECTION, key, "must be a number (degrees)")? {
            *field = v;
        }
    }
    if let Some(v) = text(props, "image_extension") {
        provider.image_extension = v.trim_start_matches('.').to_string();
    }
    if let Some(v) = text(props, "content_type") {
        provider.content_type = v.to_string();
    }
    if let Some(v) = text(props, "attribution") {
        provider.attribution = v.to_string();
    }
    if let Some(v) = text(props, "api_key") {
        provider.api_key = Some(v.to_string());
    }
    if let Some(v) = boolean(props, SECTION, "requires_key")? {
        provider.requires_key = v;
    }
    for (key, value) in props.iter() {
        if let Some(header) = key.strip_prefix(HEADER_PREFIX) {
            provider
                .headers
                .insert(header.to_string(), value.trim().to_string());
        }
    }
    Ok(())
}

fn parse_cache_tier(name: &str, props: &Properties) -> Result<CacheTierConfig, ConfigFileError> {
    let section = format!("{CACHE_TIER_PREFIX}{name}");
    let section = section.as_str();

    let storage = match text(props, "storage").map(str::to_ascii_lowercase).as_deref() {
        None | Some("memory") => TierStorage::Memory,
        Some("disk") => TierStorage::Disk {
            directory: text(props, "directory")
                .map(expand_tilde)
                .unwrap_or_else(|| default_disk_directory().join(name)),
        },
        Some(other) => return Err(invalid(section, "storage", other, "must be 'memory' or 'disk'")),
    };

    let mut tier = CacheTierConfig {
        name: name.to_string(),
        storage,
        max_bytes: 0,
        max_entries: 0,
        retention: None,
    };
    if let Some(v) = size_quota(props, section, "max_size")? {
        tier.max_bytes = v;
    }
    if let Some(v) = props.get("max_entries") {
        tier.max_entries = if is_unlimited(v) {
            0
        } else {
            v.trim()
                .parse()
                .map_err(|_| invalid(section, "max_entries", v, "must be an integer or 'unlimited'"))?
        };
    }
    if let Some(v) = optional_duration(props, section, "retention")? {
        tier.retention = v;
    }
    Ok(tier)
}
