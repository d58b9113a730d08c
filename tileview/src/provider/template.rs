//! Configuration-driven providers.
//!
//! Both provider kinds expand a URL template taken from [`ProviderSettings`].
//! Placeholders are written in braces:
//!
//! | Placeholder                   | Value                                   |
//! |-------------------------------|-----------------------------------------|
//! | `{z}` `{zoom}` `{scale}`      | scale                                   |
//! | `{x}` `{col}` `{column}`      | tile column (wrapped)                   |
//! | `{y}` `{row}`                 | tile row                                |
//! | `{q}` `{quadkey}`             | quadkey                                 |
//! | `{s}` `{subdomain}`           | subdomain, picked by `(row + column)`   |
//! | `{style}`                     | map style, empty when unset             |
//! | `{key}` `{api_key}`           | API key                                 |
//! | `{ext}` `{extension}`         | image extension                         |
//! | `{lat}` `{long}` `{lon}`      | center, static images only              |
//! | `{width}` `{height}`          | image size, static images only          |

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::coord::{Projection, ProjectionKind};
use crate::region::{MapBlock, StaticBlock, TileBlock};

use super::types::{Credentials, ProviderError, ProviderSettings, RequestDescriptor, TileProvider};

/// Registry kind of [`XyzTemplateProvider`].
pub const XYZ_TEMPLATE_KIND: &str = "xyz-template";

/// Registry kind of [`StaticTemplateProvider`].
pub const STATIC_TEMPLATE_KIND: &str = "static-template";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Scale,
    Column,
    Row,
    Quadkey,
    Subdomain,
    Style,
    Key,
    Extension,
    Lat,
    Long,
    Width,
    Height,
}

impl Field {
    fn parse(name: &str) -> Option<Self> {
        let field = match name {
            "z" | "zoom" | "scale" => Field::Scale,
            "x" | "col" | "column" => Field::Column,
            "y" | "row" => Field::Row,
            "q" | "quadkey" => Field::Quadkey,
            "s" | "subdomain" => Field::Subdomain,
            "style" => Field::Style,
            "key" | "api_key" => Field::Key,
            "ext" | "extension" => Field::Extension,
            "lat" => Field::Lat,
            "long" | "lon" | "lng" => Field::Long,
            "width" => Field::Width,
            "height" => Field::Height,
            _ => return None,
        };
        Some(field)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(Field),
}

/// A parsed URL template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl UrlTemplate {
    pub fn parse(template: &str) -> Result<Self, ProviderError> {
        let invalid = |reason: String| ProviderError::InvalidTemplate {
            template: template.to_string(),
            reason,
        };

        if template.trim().is_empty() {
            return Err(invalid("template is empty".to_string()));
        }

        let mut segments = Vec::new();
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            if open > 0 {
                segments.push(Segment::Literal(rest[..open].to_string()));
            }
            let after = &rest[open + 1..];
            let close = after
                .find('}')
                .ok_or_else(|| invalid(format!("unclosed '{{' at byte {}", template.len() - rest.len() + open)))?;
            let name = after[..close].trim();
            let field = Field::parse(name)
                .ok_or_else(|| invalid(format!("unknown placeholder '{{{}}}'", name)))?;
            segments.push(Segment::Field(field));
            rest = &after[close + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    fn uses(&self, field: Field) -> bool {
        self.segments.contains(&Segment::Field(field))
    }

    fn render(&self, mut value: impl FnMut(Field) -> Option<String>) -> Option<String> {
        let mut out = String::with_capacity(self.source.len() + 16);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(field) => out.push_str(&value(*field)?),
            }
        }
        Some(out)
    }
}

/// State shared by both template provider kinds.
#[derive(Debug)]
struct TemplateCore {
    name: String,
    projection: Projection,
    url: UrlTemplate,
    subdomains: Vec<String>,
    headers: Vec<(String, String)>,
    requires_key: bool,
    api_key: RwLock<Option<String>>,
}

impl TemplateCore {
    fn new(settings: &ProviderSettings, kind: ProjectionKind) -> Result<Self, ProviderError> {
        let url = UrlTemplate::parse(&settings.url_template)?;
        if url.uses(Field::Subdomain) && settings.subdomains.is_empty() {
            return Err(ProviderError::InvalidTemplate {
                template: settings.url_template.clone(),
                reason: "uses {s} but no subdomains are configured".to_string(),
            });
        }

        let api_key = settings
            .api_key
            .as_ref()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        Ok(Self {
            name: settings.name.clone(),
            projection: settings.projection(kind),
            requires_key: settings.requires_key || url.uses(Field::Key),
            url,
            subdomains: settings.subdomains.clone(),
            headers: settings
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
            api_key: RwLock::new(api_key),
        })
    }

    fn authenticate(&self, credentials: &Credentials) -> bool {
        match credentials.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => {
                *self.api_key.write() = Some(key.to_string());
                debug!(provider = %self.name, "Provider credentials accepted");
                true
            }
            _ if !self.requires_key => true,
            _ => {
                warn!(provider = %self.name, "Provider requires an API key");
                false
            }
        }
    }

    fn is_authenticated(&self) -> bool {
        !self.requires_key || self.api_key.read().is_some()
    }

    fn common(&self, field: Field, style: Option<&str>) -> Option<String> {
        match field {
            Field::Style => Some(style.unwrap_or_default().to_string()),
            Field::Key => self.api_key.read().clone(),
            Field::Extension => Some(self.projection.image_extension().to_string()),
            _ => None,
        }
    }

    fn descriptor(&self, uri: String) -> RequestDescriptor {
        RequestDescriptor {
            uri,
            headers: self.headers.clone(),
        }
    }
}

/// Tiled provider addressed by scale/column/row or quadkey.
#[derive(Debug)]
pub struct XyzTemplateProvider {
    core: TemplateCore,
}

impl XyzTemplateProvider {
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self, ProviderError> {
        let core = TemplateCore::new(settings, ProjectionKind::Tiled)?;
        let url = &core.url;
        if !url.uses(Field::Quadkey) && !(url.uses(Field::Column) && url.uses(Field::Row)) {
            return Err(ProviderError::InvalidTemplate {
                template: settings.url_template.clone(),
                reason: "needs {quadkey} or both {x} and {y}".to_string(),
            });
        }
        Ok(Self { core })
    }

    fn tile_uri(&self, tile: &TileBlock, style: Option<&str>) -> Option<String> {
        let scale = i32::from(tile.scale);
        if !self.core.projection.scale_range().contains(scale) {
            return None;
        }
        let tiles_per_side = 1i64 << tile.scale;
        if !(0..tiles_per_side).contains(&tile.row) || !(0..tiles_per_side).contains(&tile.column)
        {
            return None;
        }

        self.core.url.render(|field| match field {
            Field::Scale => Some(tile.scale.to_string()),
            Field::Column => Some(tile.column.to_string()),
            Field::Row => Some(tile.row.to_string()),
            Field::Quadkey => tile.quadkey.clone(),
            Field::Subdomain => {
                let index = (tile.row + tile.column) as usize % self.core.subdomains.len();
                self.core.subdomains.get(index).cloned()
            }
            Field::Lat | Field::Long | Field::Width | Field::Height => None,
            other => self.core.common(other, style),
        })
    }
}

impl TileProvider for XyzTemplateProvider {
    fn name(&self) -> &str {
        &self.core.name
    }

    fn projection(&self) -> &Projection {
        &self.core.projection
    }

    fn build_request(&self, block: &MapBlock, style: Option<&str>) -> Option<RequestDescriptor> {
        if !self.core.is_authenticated() {
            return None;
        }
        let uri = self.tile_uri(block.as_tile()?, style)?;
        Some(self.core.descriptor(uri))
    }

    fn authenticate(&self, credentials: &Credentials) -> bool {
        self.core.authenticate(credentials)
    }

    fn is_authenticated(&self) -> bool {
        self.core.is_authenticated()
    }
}

/// Provider rendering one image per region on the server.
#[derive(Debug)]
pub struct StaticTemplateProvider {
    core: TemplateCore,
}

impl StaticTemplateProvider {
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self, ProviderError> {
        let core = TemplateCore::new(settings, ProjectionKind::Static)?;
        let url = &core.url;
        if !(url.uses(Field::Lat) && url.uses(Field::Long)) {
            return Err(ProviderError::InvalidTemplate {
                template: settings.url_template.clone(),
                reason: "needs both {lat} and {long}".to_string(),
            });
        }
        Ok(Self { core })
    }

    fn image_uri(&self, image: &StaticBlock, style: Option<&str>) -> Option<String> {
        if image.width == 0 || image.height == 0 {
            return None;
        }
        if !self
            .core
            .projection
            .scale_range()
            .contains(i32::from(image.scale))
        {
            return None;
        }

        self.core.url.render(|field| match field {
            Field::Scale => Some(image.scale.to_string()),
            Field::Lat => Some(format!("{:.6}", image.center.lat)),
            Field::Long => Some(format!("{:.6}", image.center.long)),
            Field::Width => Some(image.width.to_string()),
            Field::Height => Some(image.height.to_string()),
            Field::Column | Field::Row | Field::Quadkey | Field::Subdomain => None,
            other => self.core.common(other, style),
        })
    }
}

impl TileProvider for StaticTemplateProvider {
    fn name(&self) -> &str {
        &self.core.name
    }

    fn projection(&self) -> &Projection {
        &self.core.projection
    }

    fn build_request(&self, block: &MapBlock, style: Option<&str>) -> Option<RequestDescriptor> {
        if !self.core.is_authenticated() {
            return None;
        }
        let uri = self.image_uri(block.as_static()?, style)?;
        Some(self.core.descriptor(uri))
    }

    fn authenticate(&self, credentials: &Credentials) -> bool {
        self.core.authenticate(credentials)
    }

    fn is_authenticated(&self) -> bool {
        self.core.is_authenticated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::LatLong;

    fn xyz(template: &str) -> ProviderSettings {
        ProviderSettings::new(XYZ_TEMPLATE_KIND, "osm", template)
    }

    fn tile(scale: u8, row: i64, column: i64) -> MapBlock {
        MapBlock::Tile(TileBlock::new("osm", None, scale, row, column))
    }

    #[test]
    fn test_parse_rejects_unknown_placeholder() {
        let err = UrlTemplate::parse("https://t/{zoomz}/{x}/{y}").unwrap_err();
        assert!(matches!(err, ProviderError::InvalidTemplate { .. }));
    }

    #[test]
    fn test_parse_rejects_unclosed_brace() {
        assert!(UrlTemplate::parse("https://t/{z/{x}/{y}").is_err());
        assert!(UrlTemplate::parse("   ").is_err());
    }

    #[test]
    fn test_xyz_request() {
        let provider = XyzTemplateProvider::from_settings(&xyz("https://t/{z}/{x}/{y}.{ext}")).unwrap();
        let request = provider.build_request(&tile(3, 2, 5), None).unwrap();
        assert_eq!(request.uri, "https://t/3/5/2.png");
    }

    #[test]
    fn test_quadkey_request() {
        let provider = XyzTemplateProvider::from_settings(&xyz("https://t/a/{quadkey}?g=1")).unwrap();
        let request = provider.build_request(&tile(3, 2, 3), None).unwrap();
        assert_eq!(request.uri, "https://t/a/031?g=1");
    }

    #[test]
    fn test_subdomains_rotate() {
        let mut settings = xyz("https://{s}.t/{z}/{x}/{y}");
        settings.subdomains = vec!["a".into(), "b".into(), "c".into()];
        let provider = XyzTemplateProvider::from_settings(&settings).unwrap();
        let first = provider.build_request(&tile(2, 0, 0), None).unwrap();
        let second = provider.build_request(&tile(2, 0, 1), None).unwrap();
        assert_eq!(first.uri, "https://a.t/2/0/0");
        assert_eq!(second.uri, "https://b.t/2/1/0");
    }

    #[test]
    fn test_subdomain_placeholder_needs_subdomains() {
        assert!(XyzTemplateProvider::from_settings(&xyz("https://{s}.t/{z}/{x}/{y}")).is_err());
    }

    #[test]
    fn test_xyz_needs_tile_address() {
        assert!(XyzTemplateProvider::from_settings(&xyz("https://t/{z}/{x}")).is_err());
    }

    #[test]
    fn test_out_of_range_tile_has_no_request() {
        let provider = XyzTemplateProvider::from_settings(&xyz("https://t/{z}/{x}/{y}")).unwrap();
        assert!(provider.build_request(&tile(2, 0, 4), None).is_none());
        assert!(provider.build_request(&tile(2, -1, 0), None).is_none());
        // Scale 0 is outside the default [1, 19] range.
        assert!(provider.build_request(&tile(0, 0, 0), None).is_none());
    }

    #[test]
    fn test_style_placeholder() {
        let provider =
            XyzTemplateProvider::from_settings(&xyz("https://t/{style}/{z}/{x}/{y}")).unwrap();
        let request = provider.build_request(&tile(1, 0, 1), Some("road")).unwrap();
        assert_eq!(request.uri, "https://t/road/1/1/0");
    }

    #[test]
    fn test_key_required_until_authenticated() {
        let provider =
            XyzTemplateProvider::from_settings(&xyz("https://t/{z}/{x}/{y}?key={key}")).unwrap();
        assert!(!provider.is_authenticated());
        assert!(provider.build_request(&tile(1, 0, 0), None).is_none());

        assert!(!provider.authenticate(&Credentials::default()));
        assert!(provider.authenticate(&Credentials::api_key("abc")));
        assert!(provider.is_authenticated());
        let request = provider.build_request(&tile(1, 0, 0), None).unwrap();
        assert_eq!(request.uri, "https://t/1/0/0?key=abc");
    }

    #[test]
    fn test_configured_key_is_authenticated() {
        let mut settings = xyz("https://t/{z}/{x}/{y}?key={key}");
        settings.api_key = Some("k".into());
        let provider = XyzTemplateProvider::from_settings(&settings).unwrap();
        assert!(provider.is_authenticated());
    }

    #[test]
    fn test_headers_are_attached() {
        let mut settings = xyz("https://t/{z}/{x}/{y}");
        settings
            .headers
            .insert("Referer".to_string(), "https://app.test".to_string());
        let provider = XyzTemplateProvider::from_settings(&settings).unwrap();
        let request = provider.build_request(&tile(1, 0, 0), None).unwrap();
        assert_eq!(
            request.headers,
            vec![("Referer".to_string(), "https://app.test".to_string())]
        );
    }

    #[test]
    fn test_static_request() {
        let settings = ProviderSettings::new(
            STATIC_TEMPLATE_KIND,
            "static",
            "https://s/img?c={lat},{long}&z={z}&size={width}x{height}",
        );
        let provider = StaticTemplateProvider::from_settings(&settings).unwrap();
        assert!(provider.projection().is_static());

        let block = MapBlock::Static(StaticBlock::new(
            "static",
            None,
            10,
            LatLong::new(47.5, 8.25),
            640,
            480,
        ));
        let request = provider.build_request(&block, None).unwrap();
        assert_eq!(
            request.uri,
            "https://s/img?c=47.500000,8.250000&z=10&size=640x480"
        );

        // A tiled block cannot be requested from a static provider.
        assert!(provider.build_request(&tile(1, 0, 0), None).is_none());
    }

    #[test]
    fn test_static_needs_center() {
        let settings = ProviderSettings::new(STATIC_TEMPLATE_KIND, "s", "https://s/{z}");
        assert!(StaticTemplateProvider::from_settings(&settings).is_err());
    }
}
