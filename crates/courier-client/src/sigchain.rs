use reqwest::Method;

use courier_core::api::SigchainResponse;
use courier_core::{Id, Identity};

use crate::client::Client;
use crate::error::ClientError;

impl Client {
    /// Append a statement at the given sequence number.
    pub async fn put_statement(
        &self,
        key: &Identity,
        seq: u64,
        statement: &serde_json::Value,
    ) -> Result<(), ClientError> {
        let url = self.url_for(&[
            "sigchain",
            &key.id().to_string(),
            &seq.to_string(),
        ])?;
        let body =
            serde_json::to_vec(statement).map_err(|e| ClientError::Decode(e.to_string()))?;
        self.request(Method::PUT, url, &[], key, Some(body)).await?;
        Ok(())
    }

    /// Read an identity's sigchain. Public, so the request is unsigned.
    /// `None` when the identity has no statements.
    pub async fn sigchain(&self, kid: &Id) -> Result<Option<SigchainResponse>, ClientError> {
        let url = self.url_for(&["sigchain", &kid.to_string()])?;
        let resp = reqwest::get(url).await?;
        if resp.status().as_u16() == 404 {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(Self::status_error(resp).await);
        }
        let resp: SigchainResponse = resp
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;
        Ok(Some(resp))
    }

    /// Ask the server to re-verify the caller's sigchain.
    pub async fn check(&self, key: &Identity) -> Result<(), ClientError> {
        let url = self.url_for(&["check"])?;
        self.request(Method::GET, url, &[], key, None).await?;
        Ok(())
    }
}
