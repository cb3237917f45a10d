//! Gateway webhook signature verification.

use hmac::{Hmac, Mac};
use sha2::Sha512;
use subtle::ConstantTimeEq;

type HmacSha512 = Hmac<Sha512>;

/// Header carrying the hex-encoded HMAC-SHA512 of the raw body.
pub const SIGNATURE_HEADER: &str = "x-gateway-signature";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("webhook secret is not configured")]
    MissingSecret,

    #[error("missing X-Gateway-Signature header")]
    MissingSignature,

    #[error("signature is not valid hex")]
    MalformedSignature,

    #[error("signature mismatch")]
    Mismatch,
}

/// Checks that a notification body was signed with the deployment secret.
///
/// Works on the exact raw bytes and never parses them.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: Option<Vec<u8>>,
}

impl WebhookVerifier {
    /// An empty secret leaves the verifier unconfigured; every check fails.
    pub fn new(secret: impl Into<String>) -> Self {
        let secret = secret.into();
        Self {
            secret: (!secret.is_empty()).then(|| secret.into_bytes()),
        }
    }

    fn mac(&self, body: &[u8]) -> Result<HmacSha512, VerifyError> {
        let secret = self.secret.as_deref().ok_or(VerifyError::MissingSecret)?;
        let mut mac =
            HmacSha512::new_from_slice(secret).map_err(|_| VerifyError::MissingSecret)?;
        mac.update(body);
        Ok(mac)
    }

    /// Hex signature for `body` under the configured secret.
    pub fn sign(&self, body: &[u8]) -> Result<String, VerifyError> {
        Ok(hex::encode(self.mac(body)?.finalize().into_bytes()))
    }

    pub fn verify(&self, body: &[u8], signature: Option<&str>) -> Result<(), VerifyError> {
        let expected = self.mac(body)?.finalize().into_bytes();

        let signature = signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(VerifyError::MissingSignature)?;
        // hex::decode accepts either case.
        let provided = hex::decode(signature).map_err(|_| VerifyError::MalformedSignature)?;

        if expected.as_slice().ct_eq(&provided).into() {
            Ok(())
        } else {
            Err(VerifyError::Mismatch)
        }
    }
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("configured", &self.secret.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = br#"{"payment_id":"pay-1","payment_status":"finished"}"#;

    #[test]
    fn test_sign_and_verify() {
        let verifier = WebhookVerifier::new("ipn_secret");
        let signature = verifier.sign(BODY).unwrap();

        assert_eq!(signature.len(), 128);
        assert_eq!(verifier.verify(BODY, Some(&signature)), Ok(()));
    }

    #[test]
    fn test_uppercase_hex_accepted() {
        let verifier = WebhookVerifier::new("ipn_secret");
        let signature = verifier.sign(BODY).unwrap().to_uppercase();

        assert_eq!(verifier.verify(BODY, Some(&signature)), Ok(()));
    }

    #[test]
    fn test_tampered_body_rejected() {
        let verifier = WebhookVerifier::new("ipn_secret");
        let signature = verifier.sign(BODY).unwrap();

        assert_eq!(
            verifier.verify(b"{\"payment_id\":\"pay-2\"}", Some(&signature)),
            Err(VerifyError::Mismatch)
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let signature = WebhookVerifier::new("other").sign(BODY).unwrap();
        assert_eq!(
            WebhookVerifier::new("ipn_secret").verify(BODY, Some(&signature)),
            Err(VerifyError::Mismatch)
        );
    }

    #[test]
    fn test_missing_header_rejected() {
        let verifier = WebhookVerifier::new("ipn_secret");
        assert_eq!(
            verifier.verify(BODY, None),
            Err(VerifyError::MissingSignature)
        );
        assert_eq!(
            verifier.verify(BODY, Some("  ")),
            Err(VerifyError::MissingSignature)
        );
    }

    #[test]
    fn test_missing_secret_rejected() {
        let verifier = WebhookVerifier::new("");
        assert_eq!(
            verifier.verify(BODY, Some("abcd")),
            Err(VerifyError::MissingSecret)
        );
    }

    #[test]
    fn test_non_hex_signature_rejected() {
        let verifier = WebhookVerifier::new("ipn_secret");
        assert_eq!(
            verifier.verify(BODY, Some("not-hex")),
            Err(VerifyError::MalformedSignature)
        );
    }
}
