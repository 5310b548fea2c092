//! Request identity and content-addressed cache keys.

use sha2::{Digest, Sha256};

use crate::SiteRequest;

/// Compute the cache key for a request identity.
pub fn compute_cache_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Identity of a request inside a bucket.
///
/// The URL is stored without its fragment, so `/index.html#top` and
/// `/index.html` share an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub hash: String,
    pub method: String,
    pub url: String,
}

impl RequestKey {
    pub fn for_request(request: &SiteRequest) -> Self {
        let mut url = request.url.clone();
        url.set_fragment(None);
        let url = url.to_string();
        Self { hash: compute_cache_key(&request.method, &url), method: request.method.clone(), url }
    }
}
