//! Concrete avatar endpoints.
//!
//! Three public REST endpoints can resolve a user id to an avatar URL,
//! each with its own response envelope:
//!
//! - [`SpaceProfileProvider`] - `GET /x/space/app/index?mid=` on the main
//!   API host, avatar at `data.info.face`
//! - [`UserCardProvider`] - `GET /x/web-interface/card?mid=` on the main
//!   API host, avatar at `data.card.face`
//! - [`RoomHostProvider`] - `GET /live_user/v1/Master/info?uid=` on the
//!   live API host, avatar at `data.info.face`
//!
//! All three share the same success/block conventions: HTTP 412 or an
//! envelope code of -412 means the anti-crawler gate fired, envelope
//! code 0 with a non-empty face is a hit, anything else is a miss.

use std::sync::Arc;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::trace;
use url::Url;

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{AvatarFetch, AvatarProvider, BoxFuture};

/// Base URL of the main REST API host.
pub const MAIN_API_BASE: &str = "https://api.bilibili.com";
/// Base URL of the live-platform REST API host.
pub const LIVE_API_BASE: &str = "https://api.live.bilibili.com";

/// Envelope code the endpoints use to signal the anti-crawler gate.
const BLOCKED_CODE: i64 = -412;

const SPACE_PATH: &str = "/x/space/app/index";
const CARD_PATH: &str = "/x/web-interface/card";
const MASTER_PATH: &str = "/live_user/v1/Master/info";

#[derive(Debug, Deserialize)]
struct InfoEnvelope {
    code: i64,
    #[serde(default)]
    data: Option<InfoData>,
}

#[derive(Debug, Deserialize)]
struct InfoData {
    #[serde(default)]
    info: Option<FaceInfo>,
}

#[derive(Debug, Deserialize)]
struct CardEnvelope {
    code: i64,
    #[serde(default)]
    data: Option<CardData>,
}

#[derive(Debug, Deserialize)]
struct CardData {
    #[serde(default)]
    card: Option<FaceInfo>,
}

#[derive(Debug, Deserialize)]
struct FaceInfo {
    #[serde(default)]
    face: Option<String>,
}

/// Maps an envelope code and extracted face URL to a fetch outcome.
fn classify(code: i64, face: Option<String>) -> AvatarFetch {
    if code == BLOCKED_CODE {
        return AvatarFetch::Blocked;
    }
    match face {
        Some(url) if code == 0 && !url.is_empty() => AvatarFetch::Found(url),
        _ => AvatarFetch::Miss,
    }
}

enum GateCheck<T> {
    Blocked,
    Body(T),
}

/// Issues the GET and decodes the envelope, short-circuiting on the
/// anti-crawler status before touching the body.
async fn get_json<T: DeserializeOwned>(
    client: &Client,
    name: &str,
    endpoint: &Url,
    param: &'static str,
    uid: u64,
) -> ProviderResult<GateCheck<T>> {
    trace!(provider = name, uid, "fetching avatar");

    let response = client
        .get(endpoint.clone())
        .query(&[(param, uid.to_string())])
        .send()
        .await
        .map_err(|e| {
            ProviderError::network("request failed")
                .with_provider(name)
                .with_source(e)
        })?;

    if response.status() == StatusCode::PRECONDITION_FAILED {
        return Ok(GateCheck::Blocked);
    }
    if !response.status().is_success() {
        return Err(
            ProviderError::server(format!("unexpected status {}", response.status()))
                .with_provider(name),
        );
    }

    let body = response.json::<T>().await.map_err(|e| {
        ProviderError::invalid_response("unparseable response body")
            .with_provider(name)
            .with_source(e)
    })?;
    Ok(GateCheck::Body(body))
}

/// Avatar lookup via the user space profile endpoint.
#[derive(Debug, Clone)]
pub struct SpaceProfileProvider {
    client: Client,
    endpoint: Url,
}

impl SpaceProfileProvider {
    /// Creates a provider against the given API base URL.
    pub fn new(client: Client, base: &Url) -> ProviderResult<Self> {
        let endpoint = base.join(SPACE_PATH).map_err(|e| {
            ProviderError::configuration("invalid base url")
                .with_provider("space")
                .with_source(e)
        })?;
        Ok(Self { client, endpoint })
    }
}

impl AvatarProvider for SpaceProfileProvider {
    fn name(&self) -> &str {
        "space"
    }

    fn fetch(&self, uid: u64) -> BoxFuture<'_, ProviderResult<AvatarFetch>> {
        Box::pin(async move {
            let envelope: InfoEnvelope =
                match get_json(&self.client, self.name(), &self.endpoint, "mid", uid).await? {
                    GateCheck::Blocked => return Ok(AvatarFetch::Blocked),
                    GateCheck::Body(body) => body,
                };
            let face = envelope.data.and_then(|d| d.info).and_then(|i| i.face);
            Ok(classify(envelope.code, face))
        })
    }
}

/// Avatar lookup via the user card endpoint.
#[derive(Debug, Clone)]
pub struct UserCardProvider {
    client: Client,
    endpoint: Url,
}

impl UserCardProvider {
    /// Creates a provider against the given API base URL.
    pub fn new(client: Client, base: &Url) -> ProviderResult<Self> {
        let endpoint = base.join(CARD_PATH).map_err(|e| {
            ProviderError::configuration("invalid base url")
                .with_provider("card")
                .with_source(e)
        })?;
        Ok(Self { client, endpoint })
    }
}

impl AvatarProvider for UserCardProvider {
    fn name(&self) -> &str {
        "card"
    }

    fn fetch(&self, uid: u64) -> BoxFuture<'_, ProviderResult<AvatarFetch>> {
        Box::pin(async move {
            let envelope: CardEnvelope =
                match get_json(&self.client, self.name(), &self.endpoint, "mid", uid).await? {
                    GateCheck::Blocked => return Ok(AvatarFetch::Blocked),
                    GateCheck::Body(body) => body,
                };
            let face = envelope.data.and_then(|d| d.card).and_then(|c| c.face);
            Ok(classify(envelope.code, face))
        })
    }
}

/// Avatar lookup via the live-platform room host endpoint.
///
/// Only resolves users who host a live room, so it misses more often
/// than the other two, but it sits on a different host and tends to
/// survive blocks on the main API.
#[derive(Debug, Clone)]
pub struct RoomHostProvider {
    client: Client,
    endpoint: Url,
}

impl RoomHostProvider {
    /// Creates a provider against the given live API base URL.
    pub fn new(client: Client, base: &Url) -> ProviderResult<Self> {
        let endpoint = base.join(MASTER_PATH).map_err(|e| {
            ProviderError::configuration("invalid base url")
                .with_provider("master")
                .with_source(e)
        })?;
        Ok(Self { client, endpoint })
    }
}

impl AvatarProvider for RoomHostProvider {
    fn name(&self) -> &str {
        "master"
    }

    fn fetch(&self, uid: u64) -> BoxFuture<'_, ProviderResult<AvatarFetch>> {
        Box::pin(async move {
            let envelope: InfoEnvelope =
                match get_json(&self.client, self.name(), &self.endpoint, "uid", uid).await? {
                    GateCheck::Blocked => return Ok(AvatarFetch::Blocked),
                    GateCheck::Body(body) => body,
                };
            let face = envelope.data.and_then(|d| d.info).and_then(|i| i.face);
            Ok(classify(envelope.code, face))
        })
    }
}

/// Builds the standard provider set against the production API hosts.
///
/// The order matters: it is the rotation order of the pool.
pub fn default_endpoints(client: &Client) -> ProviderResult<Vec<Arc<dyn AvatarProvider>>> {
    let main = Url::parse(MAIN_API_BASE)
        .map_err(|e| ProviderError::configuration("invalid main api base").with_source(e))?;
    let live = Url::parse(LIVE_API_BASE)
        .map_err(|e| ProviderError::configuration("invalid live api base").with_source(e))?;

    Ok(vec![
        Arc::new(SpaceProfileProvider::new(client.clone(), &main)?),
        Arc::new(UserCardProvider::new(client.clone(), &main)?),
        Arc::new(RoomHostProvider::new(client.clone(), &live)?),
    ])
}
