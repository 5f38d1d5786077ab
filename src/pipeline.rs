use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::{error, info};

use crate::request::OutboundMessage;
use crate::transport::Transport;
use crate::update::{decode_send_result, SendResult};

/// Sends outbound messages sequentially and reports each outcome through the
/// message's own callback. One failed send never blocks the next message, and
/// no aggregate result is computed.
#[derive(Clone)]
pub struct SendPipeline {
    transport: Arc<dyn Transport>,
}

impl SendPipeline {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn send_all(&self, messages: Vec<OutboundMessage>) {
        for mut message in messages {
            let outcome = self.send_one(&message).await;
            match message.on_sent.take() {
                Some(callback) => callback(outcome),
                None => log_outcome(&outcome),
            }
        }
    }

    /// Send one message and decode its acknowledgment.
    pub async fn send_one(&self, message: &OutboundMessage) -> Result<SendResult> {
        let body = self.transport.execute(message).await?;
        decode_send_result(&body)
    }

    /// Like [`send_one`](Self::send_one), but a decoded `ok = false`
    /// acknowledgment is also an error. Used where the caller needs the
    /// outcome inline, e.g. the handler-error notification path.
    pub async fn send_checked(&self, message: &OutboundMessage) -> Result<SendResult> {
        let result = self.send_one(message).await?;
        if !result.ok {
            bail!(
                "send rejected by platform: code {:?}, description {:?}",
                result.error_code,
                result.description
            );
        }
        Ok(result)
    }
}

/// Default callback for messages sent without one attached.
fn log_outcome(outcome: &Result<SendResult>) {
    match outcome {
        Ok(result) if result.ok => info!("response sent"),
        Ok(result) => error!(
            error_code = ?result.error_code,
            description = ?result.description,
            "platform rejected the send"
        ),
        Err(e) => error!("failed to send response: {e:#}"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use anyhow::bail;
    use async_trait::async_trait;

    use super::*;
    use crate::request::{HttpMethod, OutboundMessage};

    /// Answers each request from a canned list of replies, in order.
    struct ScriptedTransport {
        replies: Mutex<Vec<Result<Vec<u8>>>>,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<Result<Vec<u8>>>) -> Self {
            Self {
                replies: Mutex::new(replies),
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn execute(&self, _request: &OutboundMessage) -> Result<Vec<u8>> {
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                bail!("no scripted reply left");
            }
            replies.remove(0)
        }
    }

    fn message() -> OutboundMessage {
        OutboundMessage {
            url: "http://localhost/botT/sendMessage".to_string(),
            method: HttpMethod::Post,
            body: b"{}".to_vec(),
            content_type: "application/json".to_string(),
            on_sent: None,
        }
    }

    fn ok_reply() -> Result<Vec<u8>> {
        Ok(br#"{"ok": true, "result": true}"#.to_vec())
    }

    #[tokio::test]
    async fn test_every_message_gets_exactly_one_callback() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            ok_reply(),
            Err(anyhow::anyhow!("connection reset")),
            ok_reply(),
        ]));
        let pipeline = SendPipeline::new(transport);

        let invocations = Arc::new(AtomicUsize::new(0));
        let failures = Arc::new(AtomicUsize::new(0));
        let messages = (0..3)
            .map(|_| {
                let invocations = invocations.clone();
                let failures = failures.clone();
                message().with_callback(move |outcome| {
                    invocations.fetch_add(1, Ordering::SeqCst);
                    if outcome.is_err() {
                        failures.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        pipeline.send_all(messages).await;

        // Three submissions, three callback invocations; the middle failure
        // did not stop the third send.
        assert_eq!(invocations.load(Ordering::SeqCst), 3);
        assert_eq!(failures.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_callback_falls_back_to_logging() {
        let transport = Arc::new(ScriptedTransport::new(vec![ok_reply()]));
        let pipeline = SendPipeline::new(transport);
        // Must not panic without a callback attached.
        pipeline.send_all(vec![message()]).await;
    }

    #[tokio::test]
    async fn test_send_checked_rejects_not_ok_acknowledgment() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(
            br#"{"ok": false, "error_code": 403, "description": "Forbidden"}"#.to_vec(),
        )]));
        let pipeline = SendPipeline::new(transport);
        let err = pipeline.send_checked(&message()).await.unwrap_err();
        assert!(err.to_string().contains("403"));
    }
}
