//! Backlog handler: request.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_core::{BufferInfo, MessageId};
use relay_session::BacklogRange;
use serde_json::{Value, json};
use tracing::instrument;

use crate::context::RpcContext;
use crate::errors::RpcError;
use crate::handlers::params::{Params, invalid};
use crate::registry::{MethodHandler, MethodRegistry};

/// Replays stored messages of a buffer as `backlog.chunk` events.
///
/// `rangeStart`/`rangeEnd` are message ids, or RFC 3339 timestamps. A
/// missing or negative `rangeEnd` means no upper bound. The result is
/// `{ sent, nextStart }`; a non-null `nextStart` means the range was cut
/// short and can be resumed from that id.
pub struct RequestBacklogHandler;

#[async_trait]
impl MethodHandler for RequestBacklogHandler {
    #[instrument(skip(self, ctx, params), fields(method = "backlog.request"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let params = Params::new(params.as_ref());
        let buffer: BufferInfo = params.parse("buffer")?;
        let range = parse_range(params.value("rangeStart")?, params.optional("rangeEnd"))?;
        let page = ctx.session.request_backlog(buffer, range).await?;
        Ok(json!({ "sent": page.sent, "nextStart": page.next_start }))
    }
}

fn parse_range(start: &Value, end: Option<&Value>) -> Result<BacklogRange, RpcError> {
    let end = end.filter(|v| !v.is_null());
    if let Some(start) = start.as_i64() {
        let end = match end {
            None => None,
            Some(v) => match v.as_i64() {
                Some(n) if n < 0 => None,
                Some(n) => Some(MessageId::new(n)),
                None => return Err(invalid("rangeEnd must be a message id like rangeStart")),
            },
        };
        return Ok(BacklogRange::MessageIds {
            start: MessageId::new(start),
            end,
        });
    }

    let start = timestamp(start).ok_or_else(|| invalid("rangeStart must be a message id or RFC 3339 timestamp"))?;
    let end = match end {
        None => None,
        Some(v) => Some(timestamp(v).ok_or_else(|| invalid("rangeEnd must be an RFC 3339 timestamp like rangeStart"))?),
    };
    Ok(BacklogRange::Timestamps { start, end })
}

fn timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let text = value.as_str()?;
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

pub(crate) fn register(registry: &mut MethodRegistry) {
    registry.register("backlog.request", RequestBacklogHandler);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_helpers::make_test_context;
    use assert_matches::assert_matches;
    use relay_session::SessionEvent;
    use std::time::Duration;
    use tokio::time::timeout;

    #[test]
    fn numeric_range() {
        let range = parse_range(&json!(3), Some(&json!(9))).unwrap();
        assert_eq!(
            range,
            BacklogRange::MessageIds {
                start: MessageId::new(3),
                end: Some(MessageId::new(9)),
            }
        );
    }

    #[test]
    fn negative_or_missing_end_is_open() {
        assert_matches!(
            parse_range(&json!(1), Some(&json!(-1))).unwrap(),
            BacklogRange::MessageIds { end: None, .. }
        );
        assert_matches!(
            parse_range(&json!(1), None).unwrap(),
            BacklogRange::MessageIds { end: None, .. }
        );
    }

    #[test]
    fn timestamp_range() {
        let range = parse_range(&json!("2024-01-01T00:00:00Z"), None).unwrap();
        assert_matches!(range, BacklogRange::Timestamps { end: None, .. });
    }

    #[test]
    fn mixed_range_is_rejected() {
        let err = parse_range(&json!(1), Some(&json!("2024-01-01T00:00:00Z"))).unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMS");
        assert!(parse_range(&json!("yesterday"), None).is_err());
    }

    #[tokio::test]
    async fn timestamp_backlog_not_supported() {
        let ctx = make_test_context();
        let params = json!({
            "buffer": {"id": 1, "networkId": 1, "networkName": "freenode", "name": "#rust"},
            "rangeStart": "2024-01-01T00:00:00Z",
        });
        let err = RequestBacklogHandler.handle(Some(params), &ctx).await.unwrap_err();
        assert_eq!(err.code(), "NOT_SUPPORTED");
    }

    #[tokio::test]
    async fn backlog_replays_sent_lines() {
        let ctx = make_test_context();
        let mut rx = ctx.session.subscribe();
        let network = ctx.session.connect("freenode".into()).await.unwrap();
        let target = BufferInfo {
            id: relay_core::BufferId::new(0),
            network_id: network,
            network_name: "freenode".into(),
            name: "#rust".into(),
        };
        for text in ["one", "two", "three"] {
            ctx.session.send_input(target.clone(), text.into()).await.unwrap();
        }

        let buffer = timeout(Duration::from_secs(5), async {
            let mut seen = Vec::new();
            loop {
                if let SessionEvent::DisplayMessage(msg) = rx.recv().await.unwrap() {
                    seen.push(msg);
                    if seen.len() == 3 {
                        break seen[0].buffer.clone();
                    }
                }
            }
        })
        .await
        .unwrap();

        let params = json!({ "buffer": buffer, "rangeStart": 0, "rangeEnd": -1 });
        let result = RequestBacklogHandler.handle(Some(params), &ctx).await.unwrap();
        assert_eq!(result["sent"], 3);
        assert!(result["nextStart"].is_null());

        let chunk = timeout(Duration::from_secs(5), async {
            loop {
                if let SessionEvent::BacklogChunk { messages, is_final, .. } = rx.recv().await.unwrap() {
                    break (messages, is_final);
                }
            }
        })
        .await
        .unwrap();
        let texts: Vec<_> = chunk.0.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
        assert!(chunk.1);
    }
}
