//! Discord REST adapter.
//!
//! Implements [`InvitePlatform`] over the Discord HTTP API. Only the reads the
//! tracker needs are covered; the gateway connection is owned by an external
//! bridge that forwards events to the ingest endpoint.

use std::time::Duration;

use async_trait::async_trait;
use domain::models::LiveInvite;
use domain::services::{InvitePlatform, PlatformError};
use reqwest::{header, Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::config::DiscordConfig;

/// Page size for `GET /users/@me/guilds`.
const GUILD_PAGE_LIMIT: usize = 200;

#[derive(Debug, Deserialize)]
struct InvitePayload {
    code: String,
    #[serde(default)]
    uses: Option<u64>,
    #[serde(default)]
    inviter: Option<UserPayload>,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GuildPayload {
    #[serde(default)]
    vanity_url_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VanityPayload {
    #[serde(default)]
    uses: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct PartialGuildPayload {
    id: String,
}

impl From<InvitePayload> for LiveInvite {
    fn from(payload: InvitePayload) -> Self {
        Self {
            code: payload.code,
            uses: payload.uses,
            inviter_id: payload.inviter.map(|u| u.id),
        }
    }
}

/// Discord HTTP client authenticated as a bot.
#[derive(Clone)]
pub struct DiscordRestPlatform {
    client: Client,
    base_url: String,
    token: String,
}

impl DiscordRestPlatform {
    pub fn new(config: &DiscordConfig) -> Result<Self, PlatformError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("invite-tracker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PlatformError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: config.bot_token.clone(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, PlatformError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(path = %path, "Discord API request");

        let response = self
            .client
            .get(&url)
            .header(header::AUTHORIZATION, format!("Bot {}", self.token))
            .send()
            .await
            .map_err(|e| PlatformError::Request(e.to_string()))?;

        if let Some(err) = status_error(response.status(), path) {
            return Err(err);
        }

        response
            .json::<T>()
            .await
            .map_err(|e| PlatformError::Decode(format!("{}: {}", path, e)))
    }
}

/// Map a non-success status to the platform error the tracker understands.
fn status_error(status: StatusCode, path: &str) -> Option<PlatformError> {
    match status {
        s if s.is_success() => None,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Some(PlatformError::Unauthorized(
            format!("{} returned {}", path, status),
        )),
        StatusCode::NOT_FOUND => Some(PlatformError::NotFound(path.to_string())),
        _ => Some(PlatformError::Request(format!("{} returned {}", path, status))),
    }
}

#[async_trait]
impl InvitePlatform for DiscordRestPlatform {
    async fn fetch_invites(&self, guild_id: &str) -> Result<Vec<LiveInvite>, PlatformError> {
        let invites: Vec<InvitePayload> = self.get(&format!("/guilds/{}/invites", guild_id)).await?;
        Ok(invites.into_iter().map(LiveInvite::from).collect())
    }

    async fn vanity_code(&self, guild_id: &str) -> Result<Option<String>, PlatformError> {
        let guild: GuildPayload = self.get(&format!("/guilds/{}", guild_id)).await?;
        Ok(guild.vanity_url_code.filter(|c| !c.is_empty()))
    }

    async fn fetch_vanity_uses(&self, guild_id: &str) -> Result<Option<u64>, PlatformError> {
        let vanity: VanityPayload = self.get(&format!("/guilds/{}/vanity-url", guild_id)).await?;
        Ok(vanity.uses)
    }

    async fn list_guilds(&self) -> Result<Vec<String>, PlatformError> {
        let mut guilds = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let path = match &after {
                Some(last) => format!("/users/@me/guilds?limit={}&after={}", GUILD_PAGE_LIMIT, last),
                None => format!("/users/@me/guilds?limit={}", GUILD_PAGE_LIMIT),
            };
            let page: Vec<PartialGuildPayload> = self.get(&path).await?;
            let full_page = page.len() == GUILD_PAGE_LIMIT;
            after = page.last().map(|g| g.id.clone());
            guilds.extend(page.into_iter().map(|g| g.id));

            if !full_page {
                break;
            }
        }

        Ok(guilds)
    }
}

impl std::fmt::Debug for DiscordRestPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordRestPlatform")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
