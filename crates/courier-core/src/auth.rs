use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use url::form_urlencoded;
use url::Url;

use crate::error::AuthError;
use crate::identity::Identity;
use crate::rand_id::auth_nonce;

// Signed-request scheme: the signature covers "METHOD\nCANONICAL_URL" where
// the canonical URL carries a sorted query string containing nonce and ts
// (milliseconds), plus bhash (SHA-256 of the body) for requests with one.

pub struct SignedRequest {
    pub url: Url,
    pub authorization: String,
}

/// base64url(SHA-256(body)), the `bhash` query value.
pub fn body_hash(body: &[u8]) -> String {
    let digest = Sha256::digest(body);
    URL_SAFE_NO_PAD.encode(digest)
}

/// Sort query pairs by key then value and re-serialise, so both signer and
/// verifier derive the same byte string.
pub fn sort_query(mut url: Url) -> Url {
    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    if pairs.is_empty() {
        url.set_query(None);
        return url;
    }
    pairs.sort();
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish();
    url.set_query(Some(&query));
    url
}

/// Rebuild the canonical URL a client signed, from the server's base URL and
/// the request's path-and-query.
pub fn canonical_url(base: &str, path_and_query: &str) -> Result<Url, AuthError> {
    let joined = format!("{}{}", base.trim_end_matches('/'), path_and_query);
    let url = Url::parse(&joined).map_err(|e| AuthError::InvalidUrl(e.to_string()))?;
    Ok(sort_query(url))
}

pub fn signing_string(method: &str, url: &Url) -> String {
    format!("{}\n{}", method, url.as_str())
}

/// Add nonce/ts (and bhash for bodies) to `url`, canonicalise, and sign.
pub fn sign_request(
    method: &str,
    mut url: Url,
    key: &Identity,
    now: DateTime<Utc>,
    body: Option<&[u8]>,
) -> SignedRequest {
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("nonce", &auth_nonce());
        query.append_pair("ts", &now.timestamp_millis().to_string());
        if let Some(body) = body {
            if !body.is_empty() {
                query.append_pair("bhash", &body_hash(body));
            }
        }
    }
    let url = sort_query(url);

    let msg = signing_string(method, &url);
    let sig = key.sign(msg.as_bytes());
    let authorization = format!("{}:{}", key.id(), STANDARD.encode(sig.to_bytes()));

    SignedRequest { url, authorization }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::verify_signature;
    use ed25519_dalek::Signature;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(1_234_567_890_000).unwrap()
    }

    #[test]
    fn test_sign_request_has_nonce_and_ts() {
        let key = Identity::generate();
        let url = Url::parse("http://localhost:8080/msgs/a/b?channel=default").unwrap();
        let signed = sign_request("GET", url, &key, now(), None);

        let pairs: Vec<(String, String)> = signed.url.query_pairs().into_owned().collect();
        let nonce = pairs.iter().find(|(k, _)| k == "nonce").unwrap();
        let ts = pairs.iter().find(|(k, _)| k == "ts").unwrap();
        assert_eq!(nonce.1.len(), 32);
        assert_eq!(ts.1, "1234567890000");
    }

    #[test]
    fn test_query_is_sorted() {
        let key = Identity::generate();
        let url = Url::parse("http://localhost/x?z=1&a=2").unwrap();
        let signed = sign_request("GET", url, &key, now(), None);

        let keys: Vec<String> = signed
            .url
            .query_pairs()
            .map(|(k, _)| k.into_owned())
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_sort_is_idempotent() {
        let key = Identity::generate();
        let url = Url::parse("http://localhost/x?b=2&a=1&c=a+b").unwrap();
        let signed = sign_request("PUT", url, &key, now(), Some(b"data"));
        let resorted = sort_query(signed.url.clone());
        assert_eq!(signed.url.as_str(), resorted.as_str());
    }

    #[test]
    fn test_signature_verifies() {
        let key = Identity::generate();
        let url = Url::parse("http://localhost/check").unwrap();
        let signed = sign_request("GET", url, &key, now(), None);

        let (kid, sig_b64) = signed.authorization.split_once(':').unwrap();
        let id: crate::Id = kid.parse().unwrap();
        assert_eq!(id, key.id());

        let sig_bytes = STANDARD.decode(sig_b64).unwrap();
        let sig = Signature::from_slice(&sig_bytes).unwrap();
        let msg = signing_string("GET", &signed.url);
        assert!(verify_signature(&id, msg.as_bytes(), &sig).is_ok());
    }

    #[test]
    fn test_body_hash_included() {
        let key = Identity::generate();
        let url = Url::parse("http://localhost/msgs/a/b").unwrap();
        let signed = sign_request("POST", url, &key, now(), Some(b"hello"));
        let bhash = signed
            .url
            .query_pairs()
            .find(|(k, _)| k == "bhash")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        assert_eq!(bhash, body_hash(b"hello"));
    }
}
