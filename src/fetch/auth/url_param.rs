use crate::fetch::client::HttpClient;
use async_trait::async_trait;

/// An [`HttpClient`] wrapper that appends an access token as a URL query
/// parameter just before the request goes out.
///
/// GeoServer stations expect the token as `authkey=<token>`. Applying it at
/// this layer keeps it out of every URL that gets logged upstream.
pub struct UrlParam<C> {
    pub inner: C,
    pub param_name: String,
    pub key: String,
}

impl<C> UrlParam<C> {
    pub fn authkey(inner: C, key: &str) -> Self {
        Self {
            inner,
            param_name: crate::fetch::AUTH_PARAM.to_string(),
            key: key.to_string(),
        }
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for UrlParam<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        if !self.key.is_empty() {
            req.url_mut()
                .query_pairs_mut()
                .append_pair(&self.param_name, &self.key);
        }
        self.inner.execute(req).await
    }
}
