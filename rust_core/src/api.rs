// rust_core/src/api.rs
// REST client for the match server.
// Every call carries the bearer token from the injected credential provider.
// A 401 triggers one refresh-and-retry; a second 401 is final.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::credentials::CredentialProvider;
use crate::error::{ClientError, Result};
use crate::models::{
    AttackRequest, AuthTokens, CardDefinition, MatchId, MatchMode, MatchSnapshot,
    PlayCardRequest, ReplayStep,
};

/// The server operations the client needs. Sessions, dispatchers and the
/// lobby only ever see this trait, so tests can swap in a fake.
#[async_trait]
pub trait MatchApi: Send + Sync {
    async fn fetch_match(&self, match_id: MatchId) -> Result<MatchSnapshot>;
    async fn fetch_cards(&self) -> Result<Vec<CardDefinition>>;
    async fn play_card(&self, match_id: MatchId, request: &PlayCardRequest)
        -> Result<MatchSnapshot>;
    async fn attack(&self, match_id: MatchId, request: &AttackRequest) -> Result<MatchSnapshot>;
    async fn end_turn(&self, match_id: MatchId) -> Result<MatchSnapshot>;
    async fn fetch_replay(&self, match_id: MatchId) -> Result<Vec<ReplayStep>>;
    /// Every match the signed-in user has played or is playing.
    async fn fetch_my_matches(&self) -> Result<Vec<MatchSnapshot>>;
    async fn find_match(&self, deck_id: i64, mode: MatchMode) -> Result<MatchSnapshot>;
}

pub struct HttpMatchApi {
    client: Client,
    config: ClientConfig,
    credentials: Arc<dyn CredentialProvider>,
}

impl HttpMatchApi {
    pub fn new(config: ClientConfig, credentials: Arc<dyn CredentialProvider>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("lotus-match-core/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            config,
            credentials,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Exchanges the refresh token for a new pair and stores it.
    /// On any failure the stored tokens are cleared.
    pub async fn refresh(&self) -> Result<AuthTokens> {
        let Some(refresh_token) = self.credentials.refresh_token() else {
            self.credentials.clear();
            return Err(ClientError::Unauthorized);
        };
        let response = self
            .client
            .post(self.config.api_url("/api/auth/refresh"))
            .json(&json!({ "refreshToken": refresh_token }))
            .send()
            .await?;
        if !response.status().is_success() {
            warn!(status = response.status().as_u16(), "token refresh rejected");
            self.credentials.clear();
            return Err(ClientError::Unauthorized);
        }
        let tokens: AuthTokens = response.json().await?;
        self.credentials.store_tokens(&tokens);
        debug!("access token refreshed");
        Ok(tokens)
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T> {
        let response = self.send_once(method.clone(), path, body.as_ref()).await?;
        let response = if response.status() == StatusCode::UNAUTHORIZED {
            debug!(path, "401, refreshing token");
            self.refresh().await?;
            let retried = self.send_once(method, path, body.as_ref()).await?;
            if retried.status() == StatusCode::UNAUTHORIZED {
                return Err(ClientError::Unauthorized);
            }
            retried
        } else {
            response
        };

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let err = ClientError::from_response(status.as_u16(), &raw);
            if let ClientError::Api { body: Some(body), .. } = &err {
                debug!("{}", body.describe());
            }
            return Err(err);
        }
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn send_once(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response> {
        let mut builder = self.client.request(method, self.config.api_url(path));
        if let Some(token) = self.credentials.access_token() {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }
        Ok(builder.send().await?)
    }

    fn body<B: Serialize>(value: &B) -> Result<Option<Value>> {
        Ok(Some(serde_json::to_value(value)?))
    }
}

#[async_trait]
impl MatchApi for HttpMatchApi {
    async fn fetch_match(&self, match_id: MatchId) -> Result<MatchSnapshot> {
        self.request(Method::GET, &format!("/api/matches/{}", match_id), None)
            .await
    }

    async fn fetch_cards(&self) -> Result<Vec<CardDefinition>> {
        self.request(Method::GET, "/api/cards", None).await
    }

    async fn play_card(
        &self,
        match_id: MatchId,
        request: &PlayCardRequest,
    ) -> Result<MatchSnapshot> {
        self.request(
            Method::POST,
            &format!("/api/matches/{}/play", match_id),
            Self::body(request)?,
        )
        .await
    }

    async fn attack(&self, match_id: MatchId, request: &AttackRequest) -> Result<MatchSnapshot> {
        self.request(
            Method::POST,
            &format!("/api/matches/{}/attack", match_id),
            Self::body(request)?,
        )
        .await
    }

    async fn end_turn(&self, match_id: MatchId) -> Result<MatchSnapshot> {
        self.request(
            Method::POST,
            &format!("/api/matches/{}/end-turn", match_id),
            None,
        )
        .await
    }

    async fn fetch_replay(&self, match_id: MatchId) -> Result<Vec<ReplayStep>> {
        self.request(
            Method::GET,
            &format!("/api/matches/{}/replay", match_id),
            None,
        )
        .await
    }

    async fn fetch_my_matches(&self) -> Result<Vec<MatchSnapshot>> {
        self.request(Method::GET, "/api/matches", None).await
    }

    async fn find_match(&self, deck_id: i64, mode: MatchMode) -> Result<MatchSnapshot> {
        self.request(
            Method::POST,
            &format!("/api/matches/find?deckId={}&mode={}", deck_id, mode.as_str()),
            None,
        )
        .await
    }
}

// --- TESTS ---
