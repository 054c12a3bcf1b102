//! Binance depth-diff WebSocket stream

use crate::error::FeedError;
use crate::source::DiffStream;
use common::{DEPTH_UPDATE_EVENT, DepthDiff};
use futures_util::stream::{self, SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Subscription request
#[derive(Debug, Serialize)]
struct BinanceSubscribe<'a> {
    method: &'static str,
    params: [&'a str; 1],
    id: u64,
}

/// A decoded text frame
#[derive(Debug, PartialEq)]
pub enum StreamPayload {
    /// Depth diff
    Diff(DepthDiff),
    /// Reply to a SUBSCRIBE request
    Ack {
        /// Request id
        id: u64,
        /// `result` field, `null` on success
        result: Value,
    },
    /// Anything else on the socket
    Other,
}

/// `btcusdt@depth` or `btcusdt@depth@100ms`
#[must_use]
pub fn depth_stream_name(symbol: &str, fast_updates: bool) -> String {
    let suffix = if fast_updates { "@100ms" } else { "" };
    format!("{}@depth{}", symbol.to_lowercase(), suffix)
}

/// Decode one text frame
///
/// Accepts raw stream events and combined-stream envelopes
/// (`{"stream":..,"data":{..}}`).
///
/// # Errors
///
/// Returns [`FeedError::Decode`] if the frame is not JSON or a depth update
/// does not decode.
pub fn parse_message(text: &str) -> Result<StreamPayload, FeedError> {
    let mut value: Value = serde_json::from_str(text)?;

    if let Some(data) = value.get_mut("data") {
        if value_event(data) == Some(DEPTH_UPDATE_EVENT) {
            return Ok(StreamPayload::Diff(serde_json::from_value(data.take())?));
        }
    }

    if value_event(&value) == Some(DEPTH_UPDATE_EVENT) {
        return Ok(StreamPayload::Diff(serde_json::from_value(value)?));
    }

    if let (Some(id), Some(result)) = (value.get("id").and_then(Value::as_u64), value.get("result")) {
        return Ok(StreamPayload::Ack {
            id,
            result: result.clone(),
        });
    }

    Ok(StreamPayload::Other)
}

fn value_event(value: &Value) -> Option<&str> {
    value.get("e").and_then(Value::as_str)
}

/// Connect, subscribe to `stream_name` and return the diff stream
///
/// # Errors
///
/// Returns an error if the connection or the SUBSCRIBE request fails.
pub async fn subscribe_depth(ws_url: &str, stream_name: &str) -> Result<DiffStream, FeedError> {
    info!("Connecting to {}", ws_url);
    let (socket, _) = connect_async(ws_url).await?;
    let (mut write, read) = socket.split();

    let request = BinanceSubscribe {
        method: "SUBSCRIBE",
        params: [stream_name],
        id: 1,
    };
    write
        .send(Message::Text(serde_json::to_string(&request)?))
        .await?;
    info!("Subscribed to {}", stream_name);

    let state = StreamState {
        write,
        read,
        finished: false,
    };
    Ok(stream::unfold(state, next_diff).boxed())
}

struct StreamState {
    write: SplitSink<Socket, Message>,
    read: SplitStream<Socket>,
    finished: bool,
}

/// Read frames until the next diff; answers pings along the way
async fn next_diff(mut state: StreamState) -> Option<(Result<DepthDiff, FeedError>, StreamState)> {
    if state.finished {
        return None;
    }

    loop {
        let failure = match state.read.next().await? {
            Ok(Message::Text(text)) => match parse_message(&text) {
                Ok(StreamPayload::Diff(diff)) => return Some((Ok(diff), state)),
                Ok(StreamPayload::Ack { id, result }) => {
                    if result.is_null() {
                        info!("Subscription {} confirmed", id);
                    } else {
                        warn!("Subscription {} answered with {}", id, result);
                    }
                    continue;
                }
                Ok(StreamPayload::Other) => {
                    debug!("Ignoring message: {}", text);
                    continue;
                }
                Err(e) => e,
            },
            Ok(Message::Ping(data)) => match state.write.send(Message::Pong(data)).await {
                Ok(()) => continue,
                Err(e) => e.into(),
            },
            Ok(Message::Close(frame)) => {
                info!("WebSocket closed by server: {:?}", frame);
                return None;
            }
            Ok(_) => continue,
            Err(e) => e.into(),
        };

        state.finished = true;
        return Some((Err(failure), state));
    }
}
