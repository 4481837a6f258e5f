//! Default downstream handler: a small static site.

pub mod etag;
pub mod static_site;

pub use static_site::StaticSite;
