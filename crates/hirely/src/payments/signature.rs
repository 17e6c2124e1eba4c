//! Verification of the `Stripe-Signature` webhook header.
//!
//! The header carries `t=<unix seconds>` and one or more `v1=<hex>` entries. Each
//! `v1` value is an HMAC-SHA256 of `"<t>.<raw body>"` keyed by the endpoint secret.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "stripe-signature";
const DEFAULT_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("signature header is missing")]
    MissingHeader,
    #[error("signature header is malformed")]
    MalformedHeader,
    #[error("signature timestamp is outside the tolerance window")]
    StaleTimestamp,
    #[error("no signature matches the payload")]
    Mismatch,
    #[error("webhook secret is not a usable HMAC key")]
    InvalidSecret,
}

/// Checks webhook payloads against the shared endpoint secret.
#[derive(Clone)]
pub struct WebhookVerifier {
    keyed: HmacSha256,
    tolerance: Duration,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("secret", &"***")
            .field("tolerance", &self.tolerance)
            .finish()
    }
}

impl WebhookVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, SignatureError> {
        let keyed = HmacSha256::new_from_slice(secret.as_ref())
            .map_err(|_| SignatureError::InvalidSecret)?;
        Ok(Self {
            keyed,
            tolerance: Duration::seconds(DEFAULT_TOLERANCE_SECS),
        })
    }

    pub fn with_tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn verify(
        &self,
        payload: &[u8],
        header: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), SignatureError> {
        let header = header.ok_or(SignatureError::MissingHeader)?;
        let (timestamp, signatures) = parse_header(header)?;

        let age = now.timestamp() - timestamp;
        if age.abs() > self.tolerance.num_seconds() {
            return Err(SignatureError::StaleTimestamp);
        }

        for signature in signatures {
            let Ok(expected) = hex::decode(signature) else {
                continue;
            };
            let mut mac = self.mac();
            mac.update(timestamp.to_string().as_bytes());
            mac.update(b".");
            mac.update(payload);
            if mac.verify_slice(&expected).is_ok() {
                return Ok(());
            }
        }
        Err(SignatureError::Mismatch)
    }

    /// Produces a header value for `payload`, as the payment provider would.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> String {
        let mut mac = self.mac();
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        let digest = hex::encode(mac.finalize().into_bytes());
        format!("t={timestamp},v1={digest}")
    }

    fn mac(&self) -> HmacSha256 {
        self.keyed.clone()
    }
}

fn parse_header(header: &str) -> Result<(i64, Vec<&str>), SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => {
                timestamp = Some(
                    value
                        .parse::<i64>()
                        .map_err(|_| SignatureError::MalformedHeader)?,
                );
            }
            "v1" => signatures.push(value),
            _ => {}
        }
    }

    match (timestamp, signatures.is_empty()) {
        (Some(timestamp), false) => Ok((timestamp, signatures)),
        _ => Err(SignatureError::MalformedHeader),
    }
}
