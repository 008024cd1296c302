use reqwest::Method;

use courier_core::api::{Direction, MessageResponse, MessagesResponse};
use courier_core::{Id, Identity};

use crate::client::Client;
use crate::error::ClientError;

/// Listing options for [`Client::messages`].
#[derive(Debug, Clone)]
pub struct MessagesOpts {
    /// Resume after this cursor (0 = from the start).
    pub version: u64,
    pub direction: Direction,
    /// Page size, capped at 1000 by the server.
    pub limit: usize,
    pub channel: Option<String>,
    /// Include the per-document metadata map.
    pub include_metadata: bool,
}

impl Default for MessagesOpts {
    fn default() -> Self {
        Self {
            version: 0,
            direction: Direction::Asc,
            limit: 1000,
            channel: None,
            include_metadata: false,
        }
    }
}

impl Client {
    /// Post opaque message bytes to the pair stream. Encryption is the
    /// caller's concern; the server stores what it is given.
    pub async fn post_message(
        &self,
        sender: &Identity,
        recipient: &Id,
        data: &[u8],
        channel: Option<&str>,
    ) -> Result<String, ClientError> {
        let url = self.url_for(&[
            "msgs",
            &sender.id().to_string(),
            &recipient.to_string(),
        ])?;
        let mut params = Vec::new();
        if let Some(channel) = channel {
            params.push(("channel", channel.to_string()));
        }

        let resp = self
            .request(Method::POST, url, &params, sender, Some(data.to_vec()))
            .await?;
        let resp: MessageResponse = resp
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;
        Ok(resp.id)
    }

    /// List the pair stream from a version cursor. `None` when the stream
    /// does not exist yet.
    pub async fn messages(
        &self,
        sender: &Identity,
        recipient: &Id,
        opts: &MessagesOpts,
    ) -> Result<Option<MessagesResponse>, ClientError> {
        let url = self.url_for(&[
            "msgs",
            &sender.id().to_string(),
            &recipient.to_string(),
        ])?;

        let mut params = vec![
            ("version", opts.version.to_string()),
            ("direction", opts.direction.as_str().to_string()),
            ("limit", opts.limit.to_string()),
        ];
        if let Some(channel) = &opts.channel {
            params.push(("channel", channel.clone()));
        }
        if opts.include_metadata {
            params.push(("include", "md".to_string()));
        }

        match self.request(Method::GET, url, &params, sender, None).await {
            Ok(resp) => {
                let resp: MessagesResponse = resp
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
