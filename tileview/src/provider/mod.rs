//! Imagery provider abstraction
//!
//! A provider describes one imagery source: its projection, how a block is
//! turned into an HTTP request and whether credentials are in place. The
//! engine never embeds a specific server's URL scheme; the template
//! providers take theirs from configuration.
//!
//! # Registry
//!
//! ```ignore
//! use tileview::provider::{ProviderRegistry, ProviderSettings};
//!
//! let registry = ProviderRegistry::new();
//! let settings = ProviderSettings::new("xyz-template", "osm", "https://tile.example/{z}/{x}/{y}.png");
//! let provider = registry.create(&settings)?;
//! ```

mod http;
mod registry;
mod template;
mod types;

pub use http::{
    BodyStream, HttpResponse, HttpTransport, ReqwestTransport, TransportError, DEFAULT_USER_AGENT,
};
pub use registry::{ProviderFactory, ProviderRegistry};
pub use template::{
    StaticTemplateProvider, UrlTemplate, XyzTemplateProvider, STATIC_TEMPLATE_KIND,
    XYZ_TEMPLATE_KIND,
};
pub use types::{
    content_type_for, Credentials, ProviderError, ProviderSettings, RequestDescriptor,
    TileProvider,
};

#[cfg(test)]
pub use http::tests::{MockReply, MockTransport};
