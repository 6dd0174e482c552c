use chrono::{DateTime, SecondsFormat, Utc};

use crate::config::{CHAIN_ID, SITE_DOMAIN, SITE_ORIGIN};

pub const STATEMENT: &str = "Sign in to Nitrograph using your wallet";

/// Builds the Sign-In-With-Ethereum plaintext for `address` and a server `nonce`.
///
/// The server re-derives this exact string, so line order, blank lines and the
/// millisecond-precision `Issued At` timestamp must not change.
pub fn build_message(address: &str, nonce: &str, issued_at: DateTime<Utc>) -> String {
    format!(
        "{domain} wants you to sign in with your Ethereum account:\n\
         {address}\n\
         \n\
         {statement}\n\
         \n\
         URI: {uri}\n\
         Version: 1\n\
         Chain ID: {chain_id}\n\
         Nonce: {nonce}\n\
         Issued At: {issued_at}",
        domain = SITE_DOMAIN,
        address = address,
        statement = STATEMENT,
        uri = SITE_ORIGIN,
        chain_id = CHAIN_ID,
        nonce = nonce,
        issued_at = issued_at.to_rfc3339_opts(SecondsFormat::Millis, true),
    )
}
