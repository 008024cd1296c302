use reqwest::Method;

use courier_core::api::{InviteRequest, InviteResponse};
use courier_core::{invite, Id, Identity};

use crate::client::Client;
use crate::error::ClientError;

impl Client {
    /// Publish an invite code mapping to (sender, recipient). A live code
    /// already in use fails with `invite code collision`.
    pub async fn put_invite(
        &self,
        sender: &Identity,
        recipient: &Id,
        code: &str,
    ) -> Result<(), ClientError> {
        let code = invite::parse(code)?;
        let url = self.url_for(&[
            "invite",
            &sender.id().to_string(),
            &recipient.to_string(),
        ])?;
        let body = serde_json::to_vec(&InviteRequest { code })
            .map_err(|e| ClientError::Decode(e.to_string()))?;
        self.request(Method::PUT, url, &[], sender, Some(body)).await?;
        Ok(())
    }

    /// Resolve an invite code to its identity pair. `None` when the code is
    /// unknown or expired.
    pub async fn resolve_invite(
        &self,
        requester: &Identity,
        code: &str,
    ) -> Result<Option<InviteResponse>, ClientError> {
        let code = invite::parse(code)?;
        let url = self.url_for(&["invite", &code])?;
        match self.request(Method::GET, url, &[], requester, None).await {
            Ok(resp) => {
                let resp: InviteResponse = resp
                    .json()
                    .await
                    .map_err(|e| ClientError::Decode(e.to_string()))?;
                Ok(Some(resp))
            }
            Err(err) if matches!(err, ClientError::Status { code: 404, .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }
}
