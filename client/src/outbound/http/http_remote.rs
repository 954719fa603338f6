//! Reqwest-backed remote service adapter.
//!
//! This adapter owns transport details only: request serialisation, bearer
//! authentication, timeouts, and mapping HTTP failures onto the shared
//! remote error taxonomy.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;

use super::dto::{
    ErrorDto, FederatedLoginRequest, GrantDto, GuestLoginRequest, InsertedDto, NicknameRequest,
    RowsDto, TokenLoginRequest, WriteRecordRequest,
};
use crate::domain::ports::RemoteService;
use crate::domain::{
    AuthGrant, AuthorizationCode, GuestCredential, Nickname, Record, RecordId, RemoteError,
    RemoteRow, RowId, SessionToken,
};

/// Remote service adapter speaking JSON over HTTP.
pub struct HttpRemoteService {
    client: Client,
    base: Url,
    session: Mutex<Option<SessionToken>>,
}

impl HttpRemoteService {
    /// Build an adapter using a reqwest client with an explicit request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(base: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base,
            session: Mutex::new(None),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| {
                RemoteError::unknown(format!("base url {} cannot hold a path", self.base))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorised(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match token {
            Some(token) => request.bearer_auth(token.expose()),
            None => request,
        }
    }

    fn remember(&self, grant: &AuthGrant) {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(grant.session_token.clone());
    }

    async fn send(&self, request: RequestBuilder) -> Result<Vec<u8>, RemoteError> {
        let response = self
            .authorised(request)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }
        Ok(body.to_vec())
    }

    async fn grant(&self, request: RequestBuilder) -> Result<AuthGrant, RemoteError> {
        let body = self.send(request).await?;
        let grant = decode::<GrantDto>(&body)?
            .into_domain()
            .map_err(|err| RemoteError::unknown(format!("invalid grant: {err}")))?;
        self.remember(&grant);
        Ok(grant)
    }
}

#[async_trait]
impl RemoteService for HttpRemoteService {
    async fn authenticate_auto(&self, token: SessionToken) -> Result<AuthGrant, RemoteError> {
        let url = self.endpoint(&["auth", "token"])?;
        let body = TokenLoginRequest {
            session_token: token.expose(),
        };
        self.grant(self.client.post(url).json(&body)).await
    }

    async fn authenticate_guest(
        &self,
        guest: Option<GuestCredential>,
    ) -> Result<AuthGrant, RemoteError> {
        let url = self.endpoint(&["auth", "guest"])?;
        let body = GuestLoginRequest {
            guest_id: guest.as_ref().map(GuestCredential::expose),
        };
        self.grant(self.client.post(url).json(&body)).await
    }

    async fn exchange_federated_code(
        &self,
        code: AuthorizationCode,
    ) -> Result<AuthGrant, RemoteError> {
        let url = self.endpoint(&["auth", "federated"])?;
        let body = FederatedLoginRequest {
            authorization_code: code.expose(),
        };
        self.grant(self.client.post(url).json(&body)).await
    }

    async fn fetch_record(
        &self,
        owner: RecordId,
        category: &'static str,
        limit: usize,
    ) -> Result<Vec<RemoteRow>, RemoteError> {
        let url = self.endpoint(&["records", category])?;
        let limit = limit.to_string();
        let request = self
            .client
            .get(url)
            .query(&[("owner", owner.as_ref()), ("limit", limit.as_str())]);
        let body = self.send(request).await?;
        Ok(decode::<RowsDto>(&body)?.into_domain_rows())
    }

    async fn insert_record(
        &self,
        owner: RecordId,
        category: &'static str,
        payload: Record,
    ) -> Result<RowId, RemoteError> {
        let url = self.endpoint(&["records", category])?;
        let body = WriteRecordRequest {
            owner: owner.as_ref(),
            fields: &payload,
        };
        let response = self.send(self.client.post(url).json(&body)).await?;
        Ok(RowId::new(decode::<InsertedDto>(&response)?.row_id))
    }

    async fn update_record(
        &self,
        owner: RecordId,
        category: &'static str,
        row_id: RowId,
        payload: Record,
    ) -> Result<(), RemoteError> {
        let url = self.endpoint(&["records", category, row_id.as_ref()])?;
        let body = WriteRecordRequest {
            owner: owner.as_ref(),
            fields: &payload,
        };
        self.send(self.client.put(url).json(&body)).await.map(drop)
    }

    async fn update_nickname(
        &self,
        owner: RecordId,
        nickname: Nickname,
    ) -> Result<(), RemoteError> {
        let url = self.endpoint(&["accounts", owner.as_ref(), "nickname"])?;
        let body = NicknameRequest {
            nickname: nickname.as_ref(),
        };
        self.send(self.client.put(url).json(&body)).await.map(drop)
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, RemoteError> {
    serde_json::from_slice(body).map_err(|error| {
        RemoteError::unknown(format!(
            "invalid remote JSON payload: {error}; body: {}",
            body_preview(body)
        ))
    })
}

fn map_transport_error(error: reqwest::Error) -> RemoteError {
    let status = if error.is_timeout() {
        StatusCode::REQUEST_TIMEOUT.as_u16()
    } else {
        error.status().map_or(0, |status| status.as_u16())
    };
    RemoteError::classify(status, error.to_string())
}

fn map_status_error(status: StatusCode, body: &[u8]) -> RemoteError {
    let reported = serde_json::from_slice::<ErrorDto>(body)
        .ok()
        .and_then(|dto| dto.message)
        .filter(|message| !message.trim().is_empty());
    let message = match reported {
        Some(message) => format!("status {}: {message}", status.as_u16()),
        None => {
            let body_preview = body_preview(body);
            if body_preview.is_empty() {
                format!("status {}", status.as_u16())
            } else {
                format!("status {}: {}", status.as_u16(), body_preview)
            }
        }
    };
    RemoteError::classify(status.as_u16(), message)
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}
