//! Connection supervision.
//!
//! One supervisor owns one room connection for its whole life:
//! negotiate, dial, authenticate, heartbeat, read, reconnect. Consumers
//! watch connection status and online count through watch channels and
//! receive business events through the dispatcher's bounded channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use reqwest::Client;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace, warn};

use livefeed_core::{BusinessEvent, ConnectionStatus};
use livefeed_protocol::{
    AuthPayload, Frame, GatewayEvent, auth_frame, decode_frame, decode_gateway_event,
    heartbeat_frame,
};

use crate::config::RoomConfig;
use crate::dispatch::MessageDispatcher;
use crate::error::{IngestError, IngestResult};
use crate::negotiate::{GatewayTicket, fetch_gateway_ticket};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Commands accepted by a running supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorCommand {
    /// Close the connection and stop reconnecting.
    Disconnect,
}

/// How a gateway session ended.
enum SessionEnd {
    /// The connection failed or was closed by the gateway.
    Closed,
    /// A disconnect command ended the session.
    Manual,
}

/// Owns the connect/auth/heartbeat/reconnect loop for one room.
pub struct RoomSupervisor {
    config: RoomConfig,
    http: Client,
    dispatcher: MessageDispatcher,
    events_rx: Option<mpsc::Receiver<BusinessEvent>>,
    status_tx: watch::Sender<ConnectionStatus>,
    online_tx: watch::Sender<Option<u32>>,
    command_tx: mpsc::Sender<SupervisorCommand>,
    command_rx: Option<mpsc::Receiver<SupervisorCommand>>,
    manual_close: Arc<AtomicBool>,
}

impl RoomSupervisor {
    /// Creates a supervisor for the given room.
    pub fn new(config: RoomConfig) -> IngestResult<Self> {
        let http = Client::builder().timeout(Duration::from_secs(10)).build()?;
        let (events_tx, events_rx) = mpsc::channel(config.event_buffer.max(1));
        let (command_tx, command_rx) = mpsc::channel(4);
        let (status_tx, _) = watch::channel(ConnectionStatus::Idle);
        let (online_tx, _) = watch::channel(None);
        Ok(Self {
            config,
            http,
            dispatcher: MessageDispatcher::new(events_tx),
            events_rx: Some(events_rx),
            status_tx,
            online_tx,
            command_tx,
            command_rx: Some(command_rx),
            manual_close: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Control handle, cloneable into other tasks.
    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle {
            command_tx: self.command_tx.clone(),
            manual_close: Arc::clone(&self.manual_close),
        }
    }

    /// Watch channel tracking the connection status.
    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    /// Watch channel tracking the room's online count.
    ///
    /// `None` until the first heartbeat reply and again after every
    /// session ends.
    pub fn online_count(&self) -> watch::Receiver<Option<u32>> {
        self.online_tx.subscribe()
    }

    /// Takes the business event receiver. Yields `None` after the
    /// first call.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<BusinessEvent>> {
        self.events_rx.take()
    }

    /// Runs the supervision loop until disconnected.
    pub async fn run(mut self) {
        let mut command_rx = self.command_rx.take().expect("run called twice");
        // Heartbeat bytes never change, encode once.
        let heartbeat = match heartbeat_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Heartbeat frame failed to encode");
                return;
            }
        };
        info!(room_id = self.config.room_id, "Room supervisor started");

        loop {
            let end = self.connect_once(&heartbeat, &mut command_rx).await;
            self.online_tx.send_replace(None);
            if matches!(end, SessionEnd::Manual) || self.manual_close.load(Ordering::SeqCst) {
                break;
            }

            self.status_tx.send_replace(ConnectionStatus::Reconnecting);
            info!(
                room_id = self.config.room_id,
                delay_secs = self.config.reconnect_delay.as_secs_f64(),
                "Reconnecting"
            );
            tokio::select! {
                _ = tokio::time::sleep(self.config.reconnect_delay) => {}
                // The only command is Disconnect.
                _ = command_rx.recv() => break,
            }
            if self.manual_close.load(Ordering::SeqCst) {
                break;
            }
        }

        self.status_tx.send_replace(ConnectionStatus::Idle);
        info!(room_id = self.config.room_id, "Room supervisor stopped");
    }

    /// Runs one gateway session from negotiation to close.
    async fn connect_once(
        &self,
        heartbeat: &[u8],
        command_rx: &mut mpsc::Receiver<SupervisorCommand>,
    ) -> SessionEnd {
        self.status_tx.send_replace(ConnectionStatus::Connecting);

        let ticket = match fetch_gateway_ticket(&self.http, &self.config).await {
            Ok(ticket) => ticket,
            Err(e) => {
                warn!(
                    room_id = self.config.room_id,
                    error = %e,
                    "Gateway negotiation failed"
                );
                return SessionEnd::Closed;
            }
        };
        let mut stream = match self.dial(&ticket).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(room_id = self.config.room_id, error = %e, "Gateway dial failed");
                return SessionEnd::Closed;
            }
        };
        if let Err(e) = self.authenticate(&mut stream, &ticket, heartbeat).await {
            warn!(room_id = self.config.room_id, error = %e, "Gateway auth failed");
            let _ = stream.close(None).await;
            return SessionEnd::Closed;
        }
        self.status_tx.send_replace(ConnectionStatus::AwaitingAuthReply);

        self.drive(stream, heartbeat, command_rx).await
    }

    /// Dials the negotiated hosts in order, first success wins.
    async fn dial(&self, ticket: &GatewayTicket) -> IngestResult<WsStream> {
        let scheme = if self.config.use_tls { "wss" } else { "ws" };
        let mut last_err: Option<IngestError> = None;
        for host in &ticket.hosts {
            let url = format!("{}://{}:{}/sub", scheme, host.host, host.wss_port);
            debug!(url = %url, "Dialing gateway");
            match connect_async(url.as_str()).await {
                Ok((stream, _)) => return Ok(stream),
                Err(e) => {
                    debug!(url = %url, error = %e, "Dial failed, trying next host");
                    last_err = Some(e.into());
                }
            }
        }
        Err(last_err.unwrap_or_else(|| IngestError::negotiation("no gateway hosts to dial")))
    }

    /// Sends the auth frame followed by the first heartbeat.
    async fn authenticate(
        &self,
        stream: &mut WsStream,
        ticket: &GatewayTicket,
        heartbeat: &[u8],
    ) -> IngestResult<()> {
        let payload = AuthPayload::new(
            self.config.uid,
            self.config.room_id,
            self.config.protocol_version,
            self.config.platform.as_str(),
            ticket.token.as_str(),
        );
        let auth = auth_frame(&payload)?;
        stream.send(Message::Binary(auth.into())).await?;
        stream.send(Message::Binary(heartbeat.to_vec().into())).await?;
        trace!(room_id = self.config.room_id, "Auth and first heartbeat sent");
        Ok(())
    }

    /// Pumps one authenticated session: reads frames, beats the
    /// heartbeat, honors disconnects.
    async fn drive(
        &self,
        stream: WsStream,
        heartbeat: &[u8],
        command_rx: &mut mpsc::Receiver<SupervisorCommand>,
    ) -> SessionEnd {
        let (mut sink, mut source) = stream.split();
        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + self.config.heartbeat_interval,
            self.config.heartbeat_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                message = source.next() => match message {
                    Some(Ok(Message::Binary(payload))) => {
                        self.handle_payload(&payload).await;
                    }
                    Some(Ok(Message::Close(_))) => {
                        debug!(room_id = self.config.room_id, "Gateway closed the connection");
                        return SessionEnd::Closed;
                    }
                    Some(Ok(_)) => {
                        trace!("Ignoring non-binary message");
                    }
                    Some(Err(e)) => {
                        warn!(room_id = self.config.room_id, error = %e, "Gateway read failed");
                        return SessionEnd::Closed;
                    }
                    None => {
                        debug!(room_id = self.config.room_id, "Gateway stream ended");
                        return SessionEnd::Closed;
                    }
                },
                _ = ticker.tick() => {
                    // A send failure here is not fatal; the read side
                    // reports the close.
                    match sink.send(Message::Binary(heartbeat.to_vec().into())).await {
                        Ok(()) => trace!(room_id = self.config.room_id, "Heartbeat sent"),
                        Err(e) => warn!(
                            room_id = self.config.room_id,
                            error = %e,
                            "Heartbeat send failed"
                        ),
                    }
                }
                _ = command_rx.recv() => {
                    info!(room_id = self.config.room_id, "Disconnect requested");
                    self.status_tx.send_replace(ConnectionStatus::Closing);
                    let _ = sink.close().await;
                    return SessionEnd::Manual;
                }
            }
        }
    }

    /// Walks every frame in one WebSocket message.
    async fn handle_payload(&self, payload: &[u8]) {
        let mut offset = 0usize;
        while offset < payload.len() {
            match decode_frame(&payload[offset..]) {
                Ok((frame, consumed)) => {
                    self.handle_frame(&frame).await;
                    offset += consumed;
                }
                Err(e) => {
                    warn!(error = %e, "Dropping undecodable gateway payload");
                    break;
                }
            }
        }
    }

    async fn handle_frame(&self, frame: &Frame) {
        match decode_gateway_event(frame) {
            Ok(Some(GatewayEvent::AuthAccepted)) => {
                info!(room_id = self.config.room_id, "Gateway accepted auth");
                self.status_tx.send_replace(ConnectionStatus::Open);
            }
            Ok(Some(GatewayEvent::OnlineCount(count))) => {
                trace!(room_id = self.config.room_id, count, "Online count updated");
                self.online_tx.send_replace(Some(count));
            }
            Ok(Some(GatewayEvent::Events(documents))) => {
                for document in documents {
                    self.dispatcher.dispatch(document).await;
                }
            }
            Ok(None) => {
                trace!(operation = ?frame.operation, "Ignoring frame");
            }
            Err(e) => {
                debug!(error = %e, "Skipping undecodable frame");
            }
        }
    }
}

/// Cloneable control handle for a running supervisor.
#[derive(Debug, Clone)]
pub struct SupervisorHandle {
    command_tx: mpsc::Sender<SupervisorCommand>,
    manual_close: Arc<AtomicBool>,
}

impl SupervisorHandle {
    /// Closes the connection and stops the reconnect loop.
    ///
    /// Idempotent, and effective whether a session is up, a reconnect
    /// is pending, or negotiation is in flight.
    pub async fn disconnect(&self) {
        self.manual_close.store(true, Ordering::SeqCst);
        let _ = self.command_tx.send(SupervisorCommand::Disconnect).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livefeed_protocol::{Operation, ProtocolVersion, encode_frame};
    use serde_json::json;
    use tokio::net::TcpListener;
    use tokio::time::timeout;
    use tokio_tungstenite::accept_async;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn auth_reply_frame() -> Vec<u8> {
        encode_frame(&Frame::new(
            Operation::AuthReply,
            ProtocolVersion::Json,
            b"{\"code\":0}".to_vec(),
        ))
        .unwrap()
    }

    fn chat_frame(text: &str) -> Vec<u8> {
        let body = json!({"cmd": "DANMU_MSG", "info": [[], text, [7, "viewer"]]});
        encode_frame(&Frame::new(
            Operation::Message,
            ProtocolVersion::Json,
            serde_json::to_vec(&body).unwrap(),
        ))
        .unwrap()
    }

    /// Reads the client's auth frame, replies, and returns the decoded
    /// auth payload.
    async fn serve_handshake(ws: &mut WebSocketStream<TcpStream>) -> serde_json::Value {
        let first = ws.next().await.unwrap().unwrap();
        let Message::Binary(payload) = first else {
            panic!("expected a binary auth frame, got {first:?}");
        };
        let (frame, _) = decode_frame(&payload).unwrap();
        assert_eq!(frame.operation, Operation::Auth);
        ws.send(Message::Binary(auth_reply_frame().into()))
            .await
            .unwrap();
        serde_json::from_slice(&frame.payload).unwrap()
    }

    async fn drain(ws: &mut WebSocketStream<TcpStream>) {
        while let Some(Ok(_)) = ws.next().await {}
    }

    async fn mount_negotiation(api: &MockServer, room_id: u64, port: u16, hits: u64) {
        Mock::given(method("GET"))
            .and(path("/xlive/web-room/v1/index/getDanmuInfo"))
            .and(query_param("id", room_id.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "data": {
                    "token": "tok-1",
                    "host_list": [{"host": "127.0.0.1", "wss_port": port}]
                }
            })))
            .expect(hits)
            .mount(api)
            .await;
    }

    fn local_config(api: &MockServer, room_id: u64) -> RoomConfig {
        RoomConfig::new(room_id)
            .with_api_base(api.uri())
            .with_use_tls(false)
    }

    #[tokio::test]
    async fn reaches_open_and_streams_events() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let gateway = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(socket).await.unwrap();

            let auth = serve_handshake(&mut ws).await;
            assert_eq!(auth["roomid"], 1000);
            assert_eq!(auth["key"], "tok-1");
            assert_eq!(auth["protover"], 3);
            assert_eq!(auth["type"], 2);

            ws.send(Message::Binary(chat_frame("hello room").into()))
                .await
                .unwrap();
            drain(&mut ws).await;
        });

        let api = MockServer::start().await;
        mount_negotiation(&api, 1000, port, 1).await;

        let mut supervisor = RoomSupervisor::new(local_config(&api, 1000)).unwrap();
        let handle = supervisor.handle();
        let mut status = supervisor.status();
        let mut events = supervisor.take_events().unwrap();
        let task = tokio::spawn(supervisor.run());

        let event = timeout(Duration::from_secs(2), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.cmd, "DANMU_MSG");
        assert_eq!(event.payload["info"][1], "hello room");
        assert!(status.borrow_and_update().is_open());

        handle.disconnect().await;
        timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
        assert_eq!(*status.borrow(), ConnectionStatus::Idle);

        gateway.await.unwrap();
    }

    #[tokio::test]
    async fn sends_periodic_heartbeats_after_auth() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (beats_tx, mut beats_rx) = mpsc::channel::<Vec<u8>>(8);

        let gateway = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(socket).await.unwrap();
            serve_handshake(&mut ws).await;

            while let Some(Ok(message)) = ws.next().await {
                if let Message::Binary(payload) = message {
                    if beats_tx.send(payload.to_vec()).await.is_err() {
                        break;
                    }
                }
            }
        });

        let api = MockServer::start().await;
        mount_negotiation(&api, 1005, port, 1).await;

        let config =
            local_config(&api, 1005).with_heartbeat_interval(Duration::from_millis(150));
        let mut supervisor = RoomSupervisor::new(config).unwrap();
        let handle = supervisor.handle();
        let task = tokio::spawn(supervisor.run());

        // First beat rides the handshake, the rest come off the ticker.
        for _ in 0..3 {
            let payload = timeout(Duration::from_secs(2), beats_rx.recv())
                .await
                .unwrap()
                .unwrap();
            let (frame, _) = decode_frame(&payload).unwrap();
            assert_eq!(frame.operation, Operation::Heartbeat);
            assert_eq!(frame.payload, b"[object Object]");
        }

        handle.disconnect().await;
        timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
        gateway.await.unwrap();
    }

    #[tokio::test]
    async fn reconnects_after_gateway_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let gateway = tokio::spawn(async move {
            // First session ends abruptly right after auth.
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(socket).await.unwrap();
            serve_handshake(&mut ws).await;
            drop(ws);

            // Second session proves the client came back on its own.
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(socket).await.unwrap();
            serve_handshake(&mut ws).await;
            ws.send(Message::Binary(chat_frame("back online").into()))
                .await
                .unwrap();
            drain(&mut ws).await;
        });

        let api = MockServer::start().await;
        mount_negotiation(&api, 1001, port, 2).await;

        let config =
            local_config(&api, 1001).with_reconnect_delay(Duration::from_millis(100));
        let mut supervisor = RoomSupervisor::new(config).unwrap();
        let handle = supervisor.handle();
        let mut events = supervisor.take_events().unwrap();
        let task = tokio::spawn(supervisor.run());

        let event = timeout(Duration::from_secs(3), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.payload["info"][1], "back online");

        handle.disconnect().await;
        timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
        gateway.await.unwrap();
    }

    #[tokio::test]
    async fn disconnect_suppresses_pending_reconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let gateway = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(socket).await.unwrap();
            serve_handshake(&mut ws).await;
            drop(ws);
        });

        let api = MockServer::start().await;
        // One negotiation only: the pending reconnect must never run.
        mount_negotiation(&api, 1002, port, 1).await;

        let config =
            local_config(&api, 1002).with_reconnect_delay(Duration::from_millis(500));
        let mut supervisor = RoomSupervisor::new(config).unwrap();
        let handle = supervisor.handle();
        let mut status = supervisor.status();
        let task = tokio::spawn(supervisor.run());

        timeout(Duration::from_secs(2), async {
            loop {
                status.changed().await.unwrap();
                if *status.borrow_and_update() == ConnectionStatus::Reconnecting {
                    break;
                }
            }
        })
        .await
        .unwrap();

        handle.disconnect().await;
        timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
        assert_eq!(*status.borrow(), ConnectionStatus::Idle);

        gateway.await.unwrap();
    }

    #[tokio::test]
    async fn disconnect_twice_is_idempotent() {
        let api = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/xlive/web-room/v1/index/getDanmuInfo"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&api)
            .await;

        let config =
            local_config(&api, 1003).with_reconnect_delay(Duration::from_millis(50));
        let mut supervisor = RoomSupervisor::new(config).unwrap();
        let handle = supervisor.handle();
        let status = supervisor.status();
        let task = tokio::spawn(supervisor.run());

        handle.disconnect().await;
        handle.disconnect().await;

        timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
        assert_eq!(*status.borrow(), ConnectionStatus::Idle);
    }

    #[tokio::test]
    async fn dials_next_host_when_first_refuses() {
        let dead = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead_port = dead.local_addr().unwrap().port();
        drop(dead);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let live_port = listener.local_addr().unwrap().port();

        let gateway = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(socket).await.unwrap();
            serve_handshake(&mut ws).await;
            ws.send(Message::Binary(chat_frame("second host").into()))
                .await
                .unwrap();
            drain(&mut ws).await;
        });

        let api = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/xlive/web-room/v1/index/getDanmuInfo"))
            .and(query_param("id", "1004"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "data": {
                    "token": "tok-1",
                    "host_list": [
                        {"host": "127.0.0.1", "wss_port": dead_port},
                        {"host": "127.0.0.1", "wss_port": live_port}
                    ]
                }
            })))
            .mount(&api)
            .await;

        let mut supervisor = RoomSupervisor::new(local_config(&api, 1004)).unwrap();
        let handle = supervisor.handle();
        let mut events = supervisor.take_events().unwrap();
        let task = tokio::spawn(supervisor.run());

        let event = timeout(Duration::from_secs(2), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.payload["info"][1], "second host");

        handle.disconnect().await;
        timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
        gateway.await.unwrap();
    }
}
