//! Request and response bodies of the remote service's HTTP API.
//!
//! Responses decode into these DTOs first and are then mapped into domain
//! values in one pass.

use serde::{Deserialize, Serialize};

use crate::domain::{
    AuthGrant, GuestCredential, Nickname, Record, RecordId, RemoteRow, RowId, SessionToken,
};

#[derive(Debug, Serialize)]
pub(super) struct TokenLoginRequest<'a> {
    pub(super) session_token: &'a str,
}

#[derive(Debug, Serialize)]
pub(super) struct GuestLoginRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) guest_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(super) struct FederatedLoginRequest<'a> {
    pub(super) authorization_code: &'a str,
}

#[derive(Debug, Serialize)]
pub(super) struct WriteRecordRequest<'a> {
    pub(super) owner: &'a str,
    pub(super) fields: &'a Record,
}

#[derive(Debug, Serialize)]
pub(super) struct NicknameRequest<'a> {
    pub(super) nickname: &'a str,
}

#[derive(Debug, Deserialize)]
pub(super) struct GrantDto {
    pub(super) record_id: String,
    #[serde(default)]
    pub(super) nickname: Option<String>,
    pub(super) session_token: String,
    #[serde(default)]
    pub(super) guest_id: Option<String>,
}

impl GrantDto {
    pub(super) fn into_domain(self) -> Result<AuthGrant, String> {
        let record_id = RecordId::new(self.record_id).map_err(|err| err.to_string())?;
        // A blank nickname means the account has none yet.
        let nickname = match self.nickname.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(Nickname::new(raw).map_err(|err| err.to_string())?),
        };
        let session_token = SessionToken::new(self.session_token).map_err(|err| err.to_string())?;
        let guest_credential = self
            .guest_id
            .map(GuestCredential::new)
            .transpose()
            .map_err(|err| err.to_string())?;
        Ok(AuthGrant {
            record_id,
            nickname,
            session_token,
            guest_credential,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct RowsDto {
    #[serde(default)]
    pub(super) rows: Vec<RowDto>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RowDto {
    pub(super) row_id: String,
    #[serde(default)]
    pub(super) fields: Record,
}

impl RowsDto {
    pub(super) fn into_domain_rows(self) -> Vec<RemoteRow> {
        self.rows
            .into_iter()
            .map(|row| RemoteRow {
                row_id: RowId::new(row.row_id),
                fields: row.fields,
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct InsertedDto {
    pub(super) row_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct ErrorDto {
    #[serde(default)]
    pub(super) message: Option<String>,
}
