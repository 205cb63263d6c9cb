use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("missing wallet address")]
    MissingAddress,

    #[error("invalid Solana address format: {0}")]
    InvalidAddress(String),

    #[error("address is not on the ed25519 curve: {0}")]
    OffCurveAddress(String),
}

/// Validate a wallet address: base58, 32 bytes, on-curve.
///
/// Program-derived addresses are rejected; a wallet in this system is a
/// signing account.
pub fn validate_wallet_address(address: &str) -> Result<(), ValidationError> {
    if address.trim().is_empty() {
        return Err(ValidationError::MissingAddress);
    }

    let decoded = match bs58::decode(address).into_vec() {
        Ok(bytes) => bytes,
        Err(_) => return Err(ValidationError::InvalidAddress(address.to_string())),
    };

    if decoded.len() != 32 {
        return Err(ValidationError::InvalidAddress(address.to_string()));
    }

    let mut key = [0u8; 32];
    key.copy_from_slice(&decoded);
    let pubkey = Pubkey::new_from_array(key);

    if !pubkey.is_on_curve() {
        return Err(ValidationError::OffCurveAddress(address.to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_a_system_wallet() {
        assert!(validate_wallet_address("9ii1FEiWSgDzXAbwj2oTmJXzkfCw78mnHwPQv9WQ5iTn").is_ok());
    }

    #[test]
    fn rejects_empty_and_garbage() {
        assert!(matches!(
            validate_wallet_address(""),
            Err(ValidationError::MissingAddress)
        ));
        assert!(matches!(
            validate_wallet_address("not-base58-0OIl"),
            Err(ValidationError::InvalidAddress(_))
        ));
        assert!(matches!(
            validate_wallet_address("abc"),
            Err(ValidationError::InvalidAddress(_))
        ));
    }
}
