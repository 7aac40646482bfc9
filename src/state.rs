use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{TryRngCore, rngs::OsRng};

use crate::GatewayError;

const STATE_BYTES: usize = 32;

/// Mints the opaque token that ties an authorization redirect to its
/// callback. The token doubles as the cache key suffix for verifier and
/// credential entries, so it must be unguessable.
pub fn generate() -> Result<String, GatewayError> {
    let mut bytes = [0u8; STATE_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|err| GatewayError::OsRng {
            message: err.to_string(),
        })?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::generate;

    #[test]
    fn generates_url_safe_tokens() {
        let state = generate().unwrap();
        assert_eq!(state.len(), 43);
        assert!(!state.contains('='), "state should be unpadded");
        assert!(!state.contains('+'), "state should be url safe");
        assert!(!state.contains('/'), "state should be url safe");
    }

    #[test]
    fn tokens_do_not_repeat() {
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            let state = generate().unwrap();
            assert!(seen.insert(state), "state tokens must be unique");
        }
    }
}
