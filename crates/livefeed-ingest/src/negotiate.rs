//! Gateway negotiation.
//!
//! Before dialing the live gateway the client asks the REST API which
//! hosts serve the room and which token to present during auth.

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::RoomConfig;
use crate::error::{IngestError, IngestResult};

const NEGOTIATE_PATH: &str = "/xlive/web-room/v1/index/getDanmuInfo";

/// One gateway host candidate.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayHost {
    /// Hostname or address to dial.
    pub host: String,

    /// WebSocket-over-TLS port.
    pub wss_port: u16,
}

/// Everything needed to dial and authenticate against the gateway.
#[derive(Debug, Clone)]
pub struct GatewayTicket {
    /// Auth token, echoed back in the auth payload.
    pub token: String,

    /// Host candidates in preference order.
    pub hosts: Vec<GatewayHost>,
}

#[derive(Debug, Deserialize)]
struct NegotiateEnvelope {
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<NegotiateData>,
}

#[derive(Debug, Deserialize)]
struct NegotiateData {
    token: String,
    #[serde(default)]
    host_list: Vec<GatewayHost>,
}

/// Fetches the gateway ticket for the configured room.
pub async fn fetch_gateway_ticket(
    client: &Client,
    config: &RoomConfig,
) -> IngestResult<GatewayTicket> {
    let url = format!("{}{}", config.api_base.trim_end_matches('/'), NEGOTIATE_PATH);
    debug!(room_id = config.room_id, url = %url, "Negotiating gateway");

    let envelope: NegotiateEnvelope = client
        .get(&url)
        .query(&[("id", config.room_id.to_string())])
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    if envelope.code != 0 {
        return Err(IngestError::negotiation(format!(
            "api answered code {}: {}",
            envelope.code, envelope.message
        )));
    }
    let data = envelope
        .data
        .ok_or_else(|| IngestError::negotiation("response carried no data"))?;
    if data.host_list.is_empty() {
        return Err(IngestError::negotiation("response carried no gateway hosts"));
    }

    debug!(
        room_id = config.room_id,
        hosts = data.host_list.len(),
        "Gateway negotiated"
    );
    Ok(GatewayTicket {
        token: data.token,
        hosts: data.host_list,
    })
}
