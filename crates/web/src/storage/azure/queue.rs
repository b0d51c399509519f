//! Queue service client.

use std::sync::LazyLock;

use async_trait::async_trait;
use bytes::Bytes;
use regex::Regex;
use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};

use super::{ServiceClient, xml};
use crate::storage::{MessageQueue, ReceivedMessage, StorageError, StorageResult, ignore_conflict};

static QUEUE_MESSAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<QueueMessage>(.*?)</QueueMessage>").expect("Invalid regex")
});

/// [`MessageQueue`] backed by Azure Queue storage.
#[derive(Debug, Clone)]
pub struct AzureQueue {
    client: ServiceClient,
}

impl AzureQueue {
    pub(super) const fn new(client: ServiceClient) -> Self {
        Self { client }
    }
}

fn message_body(text: &str) -> String {
    format!(
        "<QueueMessage><MessageText>{}</MessageText></QueueMessage>",
        xml::escape(text)
    )
}

/// Parse the first message of a `QueueMessagesList`, if any.
fn parse_received(body: &str) -> StorageResult<Option<ReceivedMessage>> {
    let Some(message) = QUEUE_MESSAGE_RE
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
    else {
        return Ok(None);
    };

    let field = |name: &str| {
        xml::child_text(message, name)
            .ok_or_else(|| StorageError::Malformed(format!("queue message without {name}")))
    };
    let dequeue_count = field("DequeueCount")?;

    Ok(Some(ReceivedMessage {
        message_id: field("MessageId")?,
        pop_receipt: field("PopReceipt")?,
        text: xml::child_text(message, "MessageText").unwrap_or_default(),
        dequeue_count: dequeue_count.trim().parse().map_err(|_| {
            StorageError::Malformed(format!("invalid DequeueCount {dequeue_count:?}"))
        })?,
    }))
}

#[async_trait]
impl MessageQueue for AzureQueue {
    async fn create_queue_if_not_exists(&self, queue: &str) -> StorageResult<()> {
        let url = self.client.url([queue], &[])?;
        ignore_conflict(
            self.client
                .send(Method::PUT, url, HeaderMap::new(), Bytes::new())
                .await
                .map(drop),
        )
    }

    async fn send_message(&self, queue: &str, text: &str) -> StorageResult<()> {
        let url = self.client.url([queue, "messages"], &[])?;
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/xml"));

        self.client
            .send(Method::POST, url, headers, Bytes::from(message_body(text)))
            .await?;
        Ok(())
    }

    async fn receive_message(&self, queue: &str) -> StorageResult<Option<ReceivedMessage>> {
        let url = self
            .client
            .url([queue, "messages"], &[("numofmessages", "1")])?;
        let response = self
            .client
            .send(Method::GET, url, HeaderMap::new(), Bytes::new())
            .await?;
        parse_received(&response.text().await?)
    }

    async fn delete_message(
        &self,
        queue: &str,
        message_id: &str,
        pop_receipt: &str,
    ) -> StorageResult<()> {
        let url = self
            .client
            .url([queue, "messages", message_id], &[("popreceipt", pop_receipt)])?;
        self.client
            .send(Method::DELETE, url, HeaderMap::new(), Bytes::new())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_message_body_escapes_text() {
        assert_eq!(
            message_body("a<b & c"),
            "<QueueMessage><MessageText>a&lt;b &amp; c</MessageText></QueueMessage>"
        );
    }

    #[test]
    fn test_parse_received_message() {
        let body = r#"<?xml version="1.0" encoding="utf-8"?>
<QueueMessagesList>
  <QueueMessage>
    <MessageId>5974b586-0df3-4e2d-ad0c-18e3892bfca2</MessageId>
    <InsertionTime>Fri, 09 Oct 2009 21:04:30 GMT</InsertionTime>
    <ExpirationTime>Fri, 16 Oct 2009 21:04:30 GMT</ExpirationTime>
    <PopReceipt>YzQ4Yzg1MDItYTc0Ny00OWNjLTkxYTUtZGM0MDFiZDAwYzEw</PopReceipt>
    <TimeNextVisible>Fri, 09 Oct 2009 23:29:20 GMT</TimeNextVisible>
    <DequeueCount>2</DequeueCount>
    <MessageText>order &amp; more</MessageText>
  </QueueMessage>
</QueueMessagesList>"#;

        let message = parse_received(body).unwrap().unwrap();
        assert_eq!(message.message_id, "5974b586-0df3-4e2d-ad0c-18e3892bfca2");
        assert_eq!(
            message.pop_receipt,
            "YzQ4Yzg1MDItYTc0Ny00OWNjLTkxYTUtZGM0MDFiZDAwYzEw"
        );
        assert_eq!(message.dequeue_count, 2);
        assert_eq!(message.text, "order & more");
    }

    #[test]
    fn test_parse_empty_list() {
        let body = r#"<?xml version="1.0" encoding="utf-8"?><QueueMessagesList />"#;
        assert!(parse_received(body).unwrap().is_none());
        assert!(parse_received("<QueueMessagesList></QueueMessagesList>").unwrap().is_none());
    }

    #[test]
    fn test_parse_rejects_message_without_receipt() {
        let body = "<QueueMessagesList><QueueMessage><MessageId>1</MessageId><DequeueCount>1</DequeueCount></QueueMessage></QueueMessagesList>";
        assert!(matches!(
            parse_received(body),
            Err(StorageError::Malformed(_))
        ));
    }
}
