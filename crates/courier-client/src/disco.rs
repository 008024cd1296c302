use std::time::Duration;

use reqwest::Method;

use courier_core::crypto::{box_open, box_seal};
use courier_core::{Id, Identity};

use crate::client::Client;
use crate::error::ClientError;

/// The two kinds of discovery record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoType {
    /// Offer initiates.
    Offer,
    /// Answer listens.
    Answer,
}

impl DiscoType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoType::Offer => "offer",
            DiscoType::Answer => "answer",
        }
    }
}

impl Client {
    /// Seal `data` to the recipient and publish it under
    /// `/disco/{sender}/{recipient}/{typ}` with a TTL.
    pub async fn put_disco(
        &self,
        sender: &Identity,
        recipient: &Id,
        typ: DiscoType,
        data: &str,
        expire: Duration,
    ) -> Result<(), ClientError> {
        if expire.is_zero() {
            return Err(ClientError::NoExpire);
        }

        let sealed = box_seal(
            data.as_bytes(),
            &recipient.to_x25519()?,
            &sender.x25519_secret(),
        )?;

        let url = self.url_for(&[
            "disco",
            &sender.id().to_string(),
            &recipient.to_string(),
            typ.as_str(),
        ])?;
        self.request(
            Method::PUT,
            url,
            &[("expire", expire.as_secs().to_string())],
            sender,
            Some(sealed),
        )
        .await?;
        Ok(())
    }

    /// Fetch and open a discovery record as its recipient. `None` when the
    /// record is absent or expired.
    pub async fn get_disco(
        &self,
        sender: &Id,
        recipient: &Identity,
        typ: DiscoType,
    ) -> Result<Option<String>, ClientError> {
        let url = self.url_for(&[
            "disco",
            &sender.to_string(),
            &recipient.id().to_string(),
            typ.as_str(),
        ])?;
        let Some(sealed) = self.get_document(url, &[], recipient).await? else {
            return Ok(None);
        };

        let opened = box_open(&sealed, &sender.to_x25519()?, &recipient.x25519_secret())?;
        let data = String::from_utf8(opened).map_err(|e| ClientError::Decode(e.to_string()))?;
        Ok(Some(data))
    }

    /// Remove both offer and answer for the pair.
    pub async fn delete_disco(
        &self,
        sender: &Identity,
        recipient: &Id,
    ) -> Result<(), ClientError> {
        let url = self.url_for(&[
            "disco",
            &sender.id().to_string(),
            &recipient.to_string(),
        ])?;
        self.request(Method::DELETE, url, &[], sender, None).await?;
        Ok(())
    }
}
