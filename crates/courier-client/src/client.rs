use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, Utc};
use reqwest::Method;
use tracing::debug;
use url::Url;

use courier_core::api::WireError;
use courier_core::auth::sign_request;
use courier_core::{Identity, NowFn};

use crate::error::ClientError;

/// Signed-request client for one exchange server. Cheap to clone.
#[derive(Clone)]
pub struct Client {
    url: Url,
    http: reqwest::Client,
    now_fn: Arc<StdMutex<NowFn>>,
}

impl Client {
    pub fn new(url: &str) -> Result<Self, ClientError> {
        let url = Url::parse(url).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        Ok(Self {
            url,
            http: reqwest::Client::new(),
            now_fn: Arc::new(StdMutex::new(Arc::new(Utc::now))),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn set_time_now(&self, now_fn: NowFn) {
        let mut guard = self.now_fn.lock().expect("clock lock");
        *guard = now_fn;
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        let now_fn = self.now_fn.lock().expect("clock lock");
        now_fn()
    }

    /// Base URL joined with percent-encoded path segments.
    pub(crate) fn url_for(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ClientError::InvalidUrl("cannot be a base".to_string()))?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    /// Sign and send. Non-success responses become [`ClientError::Status`]
    /// with the server's message verbatim.
    pub(crate) async fn request(
        &self,
        method: Method,
        mut url: Url,
        params: &[(&str, String)],
        key: &Identity,
        body: Option<Vec<u8>>,
    ) -> Result<reqwest::Response, ClientError> {
        for (name, value) in params {
            url.query_pairs_mut().append_pair(name, value);
        }
        let signed = sign_request(
            method.as_str(),
            url,
            key,
            self.now(),
            body.as_deref(),
        );

        debug!(method = %method, url = %signed.url, "request");

        let mut req = self
            .http
            .request(method, signed.url)
            .header("Authorization", signed.authorization);
        if let Some(body) = body {
            req = req.body(body);
        }
        let resp = req.send().await?;

        if resp.status().is_success() {
            return Ok(resp);
        }
        Err(Self::status_error(resp).await)
    }

    pub(crate) async fn status_error(resp: reqwest::Response) -> ClientError {
        let code = resp.status().as_u16();
        match resp.json::<WireError>().await {
            Ok(err) => ClientError::Status {
                code: err.error.code,
                message: err.error.message,
            },
            Err(_) => ClientError::Status {
                code,
                message: "unexpected response".to_string(),
            },
        }
    }

    /// GET returning the raw body, or `None` on 404.
    pub(crate) async fn get_document(
        &self,
        url: Url,
        params: &[(&str, String)],
        key: &Identity,
    ) -> Result<Option<Vec<u8>>, ClientError> {
        match self.request(Method::GET, url, params, key, None).await {
            Ok(resp) => Ok(Some(resp.bytes().await?.to_vec())),
            Err(err) if matches!(err, ClientError::Status { code: 404, .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }
}
