use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use std::future::Future;
use std::str::FromStr;

use crate::utils::mask_address;

#[derive(Debug)]
pub enum WalletError {
    InvalidPrivateKey(String),
    Signing(String),
}

impl std::fmt::Display for WalletError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WalletError::InvalidPrivateKey(e) => write!(f, "Invalid private key: {}", e),
            WalletError::Signing(e) => write!(f, "Failed to sign message: {}", e),
        }
    }
}

impl std::error::Error for WalletError {}

/// Anything that can prove control of an address by signing a plaintext message.
pub trait MessageSigner {
    /// EIP-55 checksummed address.
    fn address(&self) -> String;

    /// EIP-191 personal-message signature over the exact bytes of `message`,
    /// hex encoded with a `0x` prefix.
    fn sign_message(&self, message: &str) -> impl Future<Output = Result<String, WalletError>> + Send;
}

/// One configured wallet. Built fresh for every processing pass.
pub struct Account {
    signer: PrivateKeySigner,
    address: String,
}

impl Account {
    pub fn from_private_key(private_key: &str) -> Result<Self, WalletError> {
        let signer = PrivateKeySigner::from_str(private_key.trim())
            .map_err(|e| WalletError::InvalidPrivateKey(e.to_string()))?;
        let address = signer.address().to_checksum(None);
        Ok(Self { signer, address })
    }

    pub fn masked_address(&self) -> String {
        mask_address(&self.address)
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the key.
        f.debug_struct("Account").field("address", &self.address).finish()
    }
}

impl MessageSigner for Account {
    fn address(&self) -> String {
        self.address.clone()
    }

    async fn sign_message(&self, message: &str) -> Result<String, WalletError> {
        let signature = self
            .signer
            .sign_message(message.as_bytes())
            .await
            .map_err(|e| WalletError::Signing(e.to_string()))?;
        Ok(format!("0x{}", hex::encode(signature.as_bytes())))
    }
}
