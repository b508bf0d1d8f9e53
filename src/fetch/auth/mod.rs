//! Credential injection for station requests.

mod url_param;

pub use url_param::UrlParam;
