use chrono::Utc;
use log::debug;
use reqwest::header::HeaderMap;

use crate::network_client::{self, NetworkError};
use crate::processor::Context;
use crate::retry::{with_retry, RetryOutcome};
use crate::session::SessionStore;
use crate::siwe;
use crate::wallet::{MessageSigner, WalletError};

#[derive(Debug)]
pub enum AuthError {
    /// Nonce request exhausted its retries or the body had no nonce.
    NonceUnavailable,
    /// Verify request exhausted its retries.
    VerifyFailed(String),
    /// Verify succeeded at the HTTP level but returned no token.
    MissingToken,
    Network(NetworkError),
    Signing(WalletError),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::NonceUnavailable => write!(f, "Failed to fetch nonce"),
            AuthError::VerifyFailed(e) => write!(f, "Failed to verify/login: {}", e),
            AuthError::MissingToken => write!(f, "Failed to verify/login: no token in response"),
            AuthError::Network(e) => write!(f, "{}", e),
            AuthError::Signing(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for AuthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AuthError::Network(err) => Some(err),
            AuthError::Signing(err) => Some(err),
            _ => None,
        }
    }
}

impl From<NetworkError> for AuthError {
    fn from(err: NetworkError) -> Self {
        AuthError::Network(err)
    }
}

impl From<WalletError> for AuthError {
    fn from(err: WalletError) -> Self {
        AuthError::Signing(err)
    }
}

/// NONCE -> SIGNED -> VERIFIED.
///
/// Returns a fully populated [`SessionStore`] or the stage that failed. Nothing is
/// signed unless a nonce was obtained, and no store exists unless the verify body
/// carried a token.
pub async fn login<S: MessageSigner>(
    ctx: &Context,
    headers: &HeaderMap,
    signer: &S,
) -> Result<SessionStore, AuthError> {
    let (client, endpoints) = (&ctx.client, &ctx.endpoints);

    let nonce = with_retry(ctx.retry, "fetch nonce", move || {
        network_client::fetch_nonce(client, endpoints, headers)
    })
    .await
    .ok()
    .and_then(|body| body.nonce)
    .filter(|nonce| !nonce.is_empty())
    .ok_or(AuthError::NonceUnavailable)?;
    debug!("[AUTH] nonce: {}", nonce);

    let address = signer.address();
    let (address, nonce) = (address.as_str(), nonce.as_str());

    // Each attempt signs a fresh message so `Issued At` tracks the actual request.
    let verified = with_retry(ctx.retry, "verify/login", move || async move {
        let message = siwe::build_message(address, nonce, Utc::now());
        let signature = signer.sign_message(&message).await?;
        debug!("[AUTH] signed SIWE message for {}", address);
        let outcome =
            network_client::submit_signature(client, endpoints, headers, &message, &signature).await?;
        Ok::<_, AuthError>(outcome)
    })
    .await;

    let outcome = match verified {
        RetryOutcome::Done(outcome) => outcome,
        RetryOutcome::Exhausted { attempts, last_error } => {
            return Err(AuthError::VerifyFailed(format!("{} (after {} attempts)", last_error, attempts)))
        }
    };

    SessionStore::from_verify(&outcome.body, &outcome.cookies).ok_or(AuthError::MissingToken)
}
