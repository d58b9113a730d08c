//! Provider types and traits

use std::collections::BTreeMap;

use thiserror::Error;

use crate::coord::{Projection, ProjectionKind, TileSize, DEFAULT_TILE_SIZE, MAX_LAT, MIN_LAT};
use crate::range::Range;
use crate::region::MapBlock;

/// Errors that can occur while creating or configuring a provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// No factory is registered for the requested provider kind.
    #[error("Unsupported provider configuration: {0}")]
    UnsupportedConfiguration(String),

    /// The URL template cannot produce a request.
    #[error("Invalid URL template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    /// Credentials were rejected.
    #[error("Authentication failed for provider {0}")]
    AuthenticationFailed(String),

    /// The HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

/// A fully resolved request for one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub uri: String,
    pub headers: Vec<(String, String)>,
}

impl RequestDescriptor {
    pub fn get(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Credentials offered to a provider.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: Option<String>,
}

impl Credentials {
    pub fn api_key(key: impl Into<String>) -> Self {
        Self {
            api_key: Some(key.into()),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Contract between the engine and an imagery source.
///
/// A provider owns its projection, knows how to turn a block into a request
/// and decides whether it is ready to serve requests. It performs no I/O;
/// the fetcher does.
pub trait TileProvider: Send + Sync {
    /// Returns the provider's name for logging and identification.
    fn name(&self) -> &str;

    /// Geometry of this provider's imagery.
    fn projection(&self) -> &Projection;

    /// Builds the request for `block`.
    ///
    /// Returns `None` when the block cannot be requested, for example when
    /// it lies outside the tile grid or the provider is not authenticated.
    fn build_request(&self, block: &MapBlock, style: Option<&str>) -> Option<RequestDescriptor>;

    /// Offers credentials. Returns whether they were accepted.
    fn authenticate(&self, credentials: &Credentials) -> bool;

    /// Whether the provider can currently build requests.
    fn is_authenticated(&self) -> bool;
}

/// Configuration a provider factory receives.
///
/// Everything that differs between imagery sources lives here, so adding a
/// source is a configuration change rather than a code change.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    /// Registered factory kind, e.g. `xyz-template`.
    pub kind: String,
    /// Provider id, used in fragment ids and cache keys.
    pub name: String,
    pub url_template: String,
    pub subdomains: Vec<String>,
    pub min_scale: i32,
    pub max_scale: i32,
    pub tile_size: u32,
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_long: f64,
    pub max_long: f64,
    pub image_extension: String,
    pub content_type: String,
    pub attribution: String,
    /// Key substituted for `{key}`. A provider that requires a key and has
    /// none configured stays unauthenticated until one is offered.
    pub api_key: Option<String>,
    pub requires_key: bool,
    pub headers: BTreeMap<String, String>,
}

impl ProviderSettings {
    pub fn new(
        kind: impl Into<String>,
        name: impl Into<String>,
        url_template: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            url_template: url_template.into(),
            ..Self::default()
        }
    }

    /// Projection described by these settings.
    pub fn projection(&self, kind: ProjectionKind) -> Projection {
        let extension = self.image_extension.trim_start_matches('.').to_string();
        let content_type = if self.content_type.is_empty() {
            content_type_for(&extension).to_string()
        } else {
            self.content_type.clone()
        };

        Projection::web_mercator(self.name.clone())
            .with_kind(kind)
            .with_lat_range(Range::new(self.min_lat, self.max_lat))
            .with_long_range(Range::new(self.min_long, self.max_long))
            .with_scale_range(Range::new(self.min_scale, self.max_scale))
            .with_tile_size(TileSize::square(self.tile_size))
            .with_image_format(extension, content_type)
            .with_attribution(self.attribution.clone())
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            kind: String::new(),
            name: String::new(),
            url_template: String::new(),
            subdomains: Vec::new(),
            min_scale: 1,
            max_scale: 19,
            tile_size: DEFAULT_TILE_SIZE,
            min_lat: MIN_LAT,
            max_lat: MAX_LAT,
            min_long: -180.0,
            max_long: 180.0,
            image_extension: "png".to_string(),
            content_type: String::new(),
            attribution: String::new(),
            api_key: None,
            requires_key: false,
            headers: BTreeMap::new(),
        }
    }
}

/// MIME type for common image extensions.
pub fn content_type_for(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "image/png",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_projection() {
        let mut settings = ProviderSettings::new("xyz-template", "topo", "https://x/{z}");
        settings.min_scale = 0;
        settings.max_scale = 17;
        settings.tile_size = 512;
        settings.image_extension = ".jpg".to_string();

        let projection = settings.projection(ProjectionKind::Tiled);
        assert_eq!(projection.id(), "topo");
        assert_eq!(projection.scale_range(), Range::new(0, 17));
        assert_eq!(projection.tile_size(), TileSize::square(512));
        assert_eq!(projection.image_extension(), "jpg");
        assert_eq!(projection.content_type(), "image/jpeg");
    }

    #[test]
    fn test_explicit_content_type_wins() {
        let mut settings = ProviderSettings::new("xyz-template", "a", "u");
        settings.content_type = "image/x-custom".to_string();
        let projection = settings.projection(ProjectionKind::Static);
        assert_eq!(projection.content_type(), "image/x-custom");
        assert!(projection.is_static());
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let text = format!("{:?}", Credentials::api_key("secret"));
        assert!(!text.contains("secret"));
    }

    #[test]
    fn test_error_display() {
        let err = ProviderError::UnsupportedConfiguration("wms".to_string());
        assert_eq!(err.to_string(), "Unsupported provider configuration: wms");
    }
}
