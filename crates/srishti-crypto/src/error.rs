use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key length: {0} bytes")]
    InvalidKeyLength(usize),

    #[error("mnemonic error: {0}")]
    Mnemonic(String),
}
