//! Long connection session: frame dispatch, pings, and multi-part payload reassembly.

use std::{collections::HashMap, time::Duration};

use anyhow::{Context, bail};
use futures::{SinkExt, StreamExt};
use prost::Message as _;
use tokio::time::Instant;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    base::types::{EventEnvelope, Res, Void},
    service::chat::EventCallback,
};

use super::{
    api::{ClientConfig, LarkApi},
    frame::{Frame, HEADER_MESSAGE_ID, HEADER_SEQ, HEADER_SUM, HEADER_TYPE, METHOD_CONTROL, METHOD_DATA},
};

/// Most parts a payload may be split into.
const MAX_PARTS: usize = 64;

/// How long the parts of a split payload wait for the rest.
const FRAGMENT_TTL: Duration = Duration::from_secs(5);

/// What the connection loop has to do after a frame was handled.
#[derive(Debug, PartialEq)]
pub(super) enum FrameAction {
    Send(Frame),
    UpdatePingInterval(Duration),
    Nothing,
}

/// Parts received so far for one split payload.
struct Fragments {
    parts: Vec<Option<Vec<u8>>>,
    received_at: Instant,
}

/// Per-connection state.
pub(super) struct Session {
    service_id: i32,
    callback: EventCallback,
    fragments: HashMap<String, Fragments>,
}

impl Session {
    pub(super) fn new(service_id: i32, callback: EventCallback) -> Self {
        Self {
            service_id,
            callback,
            fragments: HashMap::new(),
        }
    }

    pub(super) fn ping(&self) -> Frame {
        Frame::ping(self.service_id)
    }

    pub(super) fn handle_frame(&mut self, frame: Frame) -> FrameAction {
        match frame.method {
            METHOD_CONTROL => self.handle_control(frame),
            METHOD_DATA => self.handle_data(frame),
            other => {
                warn!("Ignoring frame with unknown method {other}.");
                FrameAction::Nothing
            }
        }
    }

    fn handle_control(&mut self, frame: Frame) -> FrameAction {
        if frame.header(HEADER_TYPE) != Some("pong") {
            return FrameAction::Nothing;
        }

        let Some(payload) = frame.payload.as_deref().filter(|p| !p.is_empty()) else {
            return FrameAction::Nothing;
        };

        match serde_json::from_slice::<ClientConfig>(payload) {
            Ok(config) => config.ping_interval().map(FrameAction::UpdatePingInterval).unwrap_or(FrameAction::Nothing),
            Err(err) => {
                warn!("Failed to parse client config from pong: {}", err);
                FrameAction::Nothing
            }
        }
    }

    fn handle_data(&mut self, mut frame: Frame) -> FrameAction {
        let started = Instant::now();

        let message_id = frame.header(HEADER_MESSAGE_ID).unwrap_or_default().to_string();
        let sum = frame.header_usize(HEADER_SUM).unwrap_or(1);
        let seq = frame.header_usize(HEADER_SEQ).unwrap_or(0);
        let payload = frame.payload.take().unwrap_or_default();

        // Parts of a split payload are only acknowledged once the whole payload arrived.
        let payload = match self.combine(message_id, sum, seq, payload, started) {
            Ok(Some(payload)) => payload,
            Ok(None) => return FrameAction::Nothing,
            Err(err) => {
                error!("Dropping payload part: {:#}", err);
                return FrameAction::Send(frame.into_response(500, started.elapsed()));
            }
        };

        let code = match frame.header(HEADER_TYPE).unwrap_or_default() {
            "event" => match EventEnvelope::from_slice(&payload) {
                Ok(envelope) => {
                    (self.callback)(envelope);
                    200
                }
                Err(err) => {
                    error!("Dropping malformed event payload: {}", err);
                    500
                }
            },
            "card" => {
                debug!("Ignoring card callback.");
                200
            }
            other => {
                warn!("Ignoring data frame of type `{other}`.");
                200
            }
        };

        FrameAction::Send(frame.into_response(code, started.elapsed()))
    }

    fn combine(&mut self, message_id: String, sum: usize, seq: usize, payload: Vec<u8>, now: Instant) -> Res<Option<Vec<u8>>> {
        if sum <= 1 {
            return Ok(Some(payload));
        }

        if sum > MAX_PARTS {
            bail!("payload `{message_id}` claims {sum} parts, at most {MAX_PARTS} are accepted");
        }

        if seq >= sum {
            bail!("part {seq} of {sum} for `{message_id}` is out of range");
        }

        self.fragments.retain(|id, fragments| {
            let fresh = now.duration_since(fragments.received_at) < FRAGMENT_TTL;
            if !fresh {
                warn!("Discarding incomplete payload `{id}`.");
            }
            fresh
        });

        let fragments = self.fragments.entry(message_id.clone()).or_insert_with(|| Fragments {
            parts: vec![None; sum],
            received_at: now,
        });
        if fragments.parts.len() != sum {
            fragments.parts = vec![None; sum];
        }
        fragments.parts[seq] = Some(payload);

        if fragments.parts.iter().any(Option::is_none) {
            return Ok(None);
        }

        Ok(self.fragments.remove(&message_id).map(|fragments| fragments.parts.into_iter().flatten().flatten().collect()))
    }
}

/// Service id the server assigned to this connection, taken from the endpoint URL.
fn service_id(url: &str) -> Res<i32> {
    let url = reqwest::Url::parse(url).context("invalid long connection URL")?;

    Ok(url.query_pairs().find(|(k, _)| k == "service_id").and_then(|(_, v)| v.parse().ok()).unwrap_or_default())
}

/// Opens the long connection and serves it until it is closed.
#[instrument(skip_all)]
pub(super) async fn run(api: &LarkApi, callback: EventCallback) -> Void {
    let endpoint = api.ws_endpoint().await?;
    let service_id = service_id(&endpoint.url)?;

    let (stream, _response) = connect_async(endpoint.url.as_str()).await.context("failed to open long connection websocket")?;
    let (mut sink, mut source) = stream.split();

    info!("Long connection established (service {}).", service_id);

    let mut session = Session::new(service_id, callback);
    let mut ping = tokio::time::interval(endpoint.ping_interval());

    loop {
        tokio::select! {
            _ = ping.tick() => {
                sink.send(WsMessage::Binary(session.ping().encode_to_vec().into())).await.context("failed to send ping")?;
            }
            message = source.next() => {
                let Some(message) = message else {
                    bail!("Long connection closed by the server.");
                };

                match message.context("failed reading long connection message")? {
                    WsMessage::Binary(bytes) => {
                        let frame = match Frame::decode(&bytes[..]) {
                            Ok(frame) => frame,
                            Err(err) => {
                                warn!("Dropping undecodable frame: {}", err);
                                continue;
                            }
                        };

                        match session.handle_frame(frame) {
                            FrameAction::Send(response) => {
                                sink.send(WsMessage::Binary(response.encode_to_vec().into())).await.context("failed to acknowledge frame")?;
                            }
                            FrameAction::UpdatePingInterval(interval) => {
                                debug!("Ping interval set to {:?}.", interval);
                                ping = tokio::time::interval_at(Instant::now() + interval, interval);
                            }
                            FrameAction::Nothing => {}
                        }
                    }
                    WsMessage::Close(reason) => bail!("Long connection closed: {:?}", reason),
                    _ => {}
                }
            }
        }
    }
}

// Tests.
