use serde::Serialize;
use serde_json::Value;

use crate::models::VerifyResponse;

pub const SESSION_V4_COOKIE: &str = "@nitrograph/session-v4";

/// Credentials derived from a successful login. Built once per account pass and
/// never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStore {
    /// `name=value` pairs of the verify response's `Set-Cookie` headers.
    pub session_v1: String,
    /// `@nitrograph/session-v4=<url-encoded JSON>`.
    pub session_v4: String,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionV4Payload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    snag_user_id: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    chain_id: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    new_account: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
}

impl SessionStore {
    /// Derives the store from a verify response. Returns `None` when the body has
    /// no (or an empty) `token`, leaving the caller with nothing to authenticate with.
    pub fn from_verify(body: &VerifyResponse, set_cookies: &[String]) -> Option<Self> {
        let token = body.token.as_deref().filter(|t| !t.is_empty())?;
        let token_data = body.token_data.as_ref();

        let payload = SessionV4Payload {
            token: Some(token),
            user_id: token_data.and_then(|d| d.user_id.as_ref()),
            snag_user_id: token_data.and_then(|d| d.snag_user_id.as_ref()),
            address: body.address.as_deref(),
            chain_id: token_data.and_then(|d| d.chain_id.as_ref()),
            expires_at: body.expires_at.as_ref(),
            new_account: token_data.and_then(|d| d.new_account),
            refresh_token: body.refresh_token.as_deref(),
        };
        // Serializing borrowed strings and JSON values cannot fail.
        let json = serde_json::to_string(&payload).unwrap_or_default();

        Some(Self {
            session_v1: cookie_pairs(set_cookies),
            session_v4: format!("{}={}", SESSION_V4_COOKIE, urlencoding::encode(&json)),
            access_token: token.to_string(),
            refresh_token: body.refresh_token.clone().unwrap_or_default(),
        })
    }

    /// Cookie header for the community host: v1 and v4 joined, empty parts skipped.
    pub fn community_cookie(&self) -> String {
        [self.session_v1.as_str(), self.session_v4.as_str()]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Cookie header for the auth host: v1 only.
    pub fn auth_cookie(&self) -> &str {
        &self.session_v1
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

/// Keeps the `name=value` part of each `Set-Cookie` value and joins them with `; `.
pub fn cookie_pairs(set_cookies: &[String]) -> String {
    set_cookies
        .iter()
        .map(|c| c.split(';').next().unwrap_or_default().trim())
        .filter(|pair| !pair.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}
