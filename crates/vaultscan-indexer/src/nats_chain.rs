//! NATS-based chain reader.
//!
//! [`NatsChainReader`] implements the [`ChainReader`] trait by sending each
//! [`ContractCall`] as a NATS request to the chain-call gateway and decoding
//! its [`CallReply`].
//!
//! # Subject Convention
//!
//! - **Request:** `infrastructure.chain_subject` (default
//!   `vaultscan.chain.call`), payload a JSON [`ContractCall`]
//! - **Reply:** a JSON [`CallReply`] on the request's inbox
//!
//! # Sync/Async Bridge
//!
//! The [`ChainReader`] trait method is synchronous, but NATS operations are
//! async. We use [`tokio::task::block_in_place`] with the current runtime
//! handle to bridge into the running tokio runtime.

use std::time::Duration;

use tracing::trace;
use vaultscan_core::{ChainError, ChainReader};
use vaultscan_types::{CallReply, ContractCall};

/// A chain reader that forwards view calls to the gateway over NATS.
pub struct NatsChainReader {
    /// The NATS client connection.
    client: async_nats::Client,
    /// Subject the gateway answers requests on.
    subject: String,
    /// Maximum time to wait for one reply.
    timeout: Duration,
}

impl NatsChainReader {
    /// Create a chain reader from an existing client.
    pub const fn new(client: async_nats::Client, subject: String, timeout: Duration) -> Self {
        Self {
            client,
            subject,
            timeout,
        }
    }

    /// The async implementation of one view call.
    async fn call_async(&self, call: &ContractCall) -> Result<serde_json::Value, ChainError> {
        let payload = serde_json::to_vec(call)
            .map_err(|e| ChainError::transport(call, format!("failed to encode call: {e}")))?;

        let request = self.client.request(self.subject.clone(), payload.into());
        let message = match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(message)) => message,
            Ok(Err(e)) => {
                return Err(ChainError::transport(
                    call,
                    format!("request on {} failed: {e}", self.subject),
                ));
            }
            Err(elapsed) => {
                return Err(ChainError::transport(
                    call,
                    format!("no reply within {}ms: {elapsed}", self.timeout.as_millis()),
                ));
            }
        };

        trace!(
            contract = %call.contract,
            method = call.method.name(),
            block = call.block,
            bytes = message.payload.len(),
            "Received chain-call reply"
        );
        decode_reply(call, &message.payload)
    }
}

/// Decode a gateway reply into the returned value or a revert.
fn decode_reply(call: &ContractCall, payload: &[u8]) -> Result<serde_json::Value, ChainError> {
    match serde_json::from_slice::<CallReply>(payload) {
        Ok(CallReply::Ok { value }) => Ok(value),
        Ok(CallReply::Reverted { reason }) => Err(ChainError::reverted(call, reason)),
        Err(e) => Err(ChainError::malformed(call, e)),
    }
}

impl std::fmt::Debug for NatsChainReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsChainReader")
            .field("subject", &self.subject)
            .field("timeout_ms", &self.timeout.as_millis())
            .finish_non_exhaustive()
    }
}

impl ChainReader for NatsChainReader {
    fn call(&mut self, call: &ContractCall) -> Result<serde_json::Value, ChainError> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| ChainError::transport(call, format!("no tokio runtime available: {e}")))?;

        // `block_in_place` keeps the runtime's other tasks running while this
        // worker thread waits on the reply.
        tokio::task::block_in_place(|| handle.block_on(self.call_async(call)))
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use alloy_primitives::address;
    use futures::StreamExt as _;
    use vaultscan_types::ContractMethod;

    use super::*;

    fn call() -> ContractCall {
        ContractCall {
            contract: address!("0x00000000000000000000000000000000000000aa"),
            method: ContractMethod::GetVaultStatus,
            block: 12,
        }
    }

    #[test]
    fn ok_reply_yields_value() {
        let payload = br#"{"status":"ok","value":{"tvl":"0x1"}}"#;
        let value = decode_reply(&call(), payload).unwrap();
        assert_eq!(value, serde_json::json!({"tvl": "0x1"}));
    }

    #[test]
    fn reverted_reply_is_a_revert() {
        let payload = br#"{"status":"reverted","reason":"paused"}"#;
        let result = decode_reply(&call(), payload);
        assert!(matches!(
            result,
            Err(ChainError::Reverted { ref reason, .. }) if reason == "paused"
        ));
    }

    #[test]
    fn garbage_reply_is_malformed_and_deterministic() {
        let result = decode_reply(&call(), b"not json");
        assert!(matches!(result, Err(ChainError::Malformed { .. })));
    }

    /// Round-trips a call through a live NATS server, answering with a
    /// scripted gateway. Skips if no server is available.
    #[tokio::test(flavor = "multi_thread")]
    async fn request_reply_through_live_nats() {
        let Ok(client) = async_nats::connect("nats://localhost:4222").await else {
            eprintln!("NATS not available, skipping");
            return;
        };
        let subject = "vaultscan.test.chain.call".to_owned();
        let mut gateway = client.subscribe(subject.clone()).await.unwrap();
        let responder = client.clone();
        tokio::spawn(async move {
            if let Some(msg) = gateway.next().await {
                if let Some(reply) = msg.reply {
                    let body = br#"{"status":"ok","value":[1,2]}"#.to_vec();
                    responder.publish(reply, body.into()).await.unwrap();
                }
            }
        });

        let mut reader = NatsChainReader::new(client, subject, Duration::from_secs(2));
        let value = reader.call(&call()).unwrap();
        assert_eq!(value, serde_json::json!([1, 2]));
    }
}
