//! Cryptographic utilities for secp256r1 (P-256) passkeys.
//!
//! This module turns WebAuthn authenticator output into the values the
//! on-chain verifier consumes:
//!
//! - DER to raw `(r, s)` signature conversion
//! - Signature normalization (low-S)
//! - Public key parsing from every encoding a platform authenticator or
//!   relying party hands out
//!
//! # Signature Format
//!
//! Authenticators return signatures in DER format:
//! ```text
//! 30 len 02 r_len r_bytes 02 s_len s_bytes
//! ```
//!
//! The verifier uses the raw scalars `r` and `s` (32 bytes each).
//!
//! # Example
//!
//! ```
//! use modular_wallet_core::crypto::{parse_der_signature, signature_components};
//!
//! let der = [0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02];
//! let (r, s) = signature_components(&parse_der_signature(&der).unwrap());
//! assert_eq!(r[31], 1);
//! assert_eq!(s[31], 2);
//! ```

use p256::PublicKey;
use p256::ecdsa::Signature as P256Signature;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::DecodePublicKey;

use crate::error::{Error, Result};

/// Parses a strict DER-encoded ECDSA signature.
///
/// # Errors
///
/// Returns [`Error::InvalidSignature`] if the DER encoding is malformed or a
/// scalar is out of range.
pub fn parse_der_signature(der: &[u8]) -> Result<P256Signature> {
    P256Signature::from_der(der).map_err(|e| Error::InvalidSignature(format!("DER: {e}")))
}

/// Splits a signature into its big-endian `(r, s)` scalars.
#[must_use]
pub fn signature_components(signature: &P256Signature) -> ([u8; 32], [u8; 32]) {
    let bytes = signature.to_bytes();
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&bytes[..32]);
    s.copy_from_slice(&bytes[32..]);
    (r, s)
}

/// Normalizes a signature to low-S form.
///
/// Verifiers that reject malleable signatures require `s <= n / 2`.
///
/// # Returns
///
/// A tuple `(signature, flipped)` where `flipped` indicates if S was negated.
#[must_use]
pub fn normalize_s(signature: P256Signature) -> (P256Signature, bool) {
    match signature.normalize_s() {
        Some(normalized) => (normalized, true),
        None => (signature, false),
    }
}

/// Parses a P-256 signature given either as raw `r || s` (64 bytes) or DER.
///
/// Raw input is taken as-is, so placeholder signatures with out-of-range
/// scalars still encode.
///
/// # Errors
///
/// Returns [`Error::InvalidSignature`] if the bytes are neither.
pub fn parse_p256_signature(bytes: &[u8]) -> Result<([u8; 32], [u8; 32])> {
    if bytes.len() == 64 {
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);
        return Ok((r, s));
    }
    Ok(signature_components(&parse_der_signature(bytes)?))
}

/// Parses a P-256 public key and returns its affine `(x, y)` coordinates.
///
/// Accepted encodings:
///
/// - 33 bytes: SEC1 compressed (`0x02`/`0x03 || x`)
/// - 64 bytes: raw `x || y`
/// - 65 bytes: SEC1 uncompressed (`0x04 || x || y`)
/// - DER `SubjectPublicKeyInfo`, as returned by
///   `AuthenticatorAttestationResponse.getPublicKey()`
///
/// # Errors
///
/// Returns [`Error::InvalidPublicKey`] if the bytes do not encode a point on
/// the curve.
pub fn parse_public_key(bytes: &[u8]) -> Result<([u8; 32], [u8; 32])> {
    let public_key = decode_public_key(bytes)?;
    let point = public_key.to_encoded_point(false);

    let (Some(x), Some(y)) = (point.x(), point.y()) else {
        return Err(Error::InvalidPublicKey("point at infinity".to_string()));
    };

    let mut x_bytes = [0u8; 32];
    let mut y_bytes = [0u8; 32];
    x_bytes.copy_from_slice(x);
    y_bytes.copy_from_slice(y);
    Ok((x_bytes, y_bytes))
}

/// Re-encodes a P-256 public key in SEC1 compressed form (33 bytes).
///
/// # Errors
///
/// Returns [`Error::InvalidPublicKey`] if the input cannot be parsed.
pub fn compress_public_key(bytes: &[u8]) -> Result<Vec<u8>> {
    let public_key = decode_public_key(bytes)?;
    Ok(public_key.to_encoded_point(true).as_bytes().to_vec())
}

fn decode_public_key(bytes: &[u8]) -> Result<PublicKey> {
    let decoded = match bytes.len() {
        33 | 65 => PublicKey::from_sec1_bytes(bytes).map_err(|e| e.to_string()),
        64 => {
            let mut uncompressed = [0u8; 65];
            uncompressed[0] = 0x04;
            uncompressed[1..].copy_from_slice(bytes);
            PublicKey::from_sec1_bytes(&uncompressed).map_err(|e| e.to_string())
        }
        _ => PublicKey::from_public_key_der(bytes).map_err(|e| e.to_string()),
    };

    decoded.map_err(|e| Error::InvalidPublicKey(format!("{} bytes: {e}", bytes.len())))
}

#[cfg(test)]
mod tests {
    use alloy_primitives::U256;
    use p256::ecdsa::SigningKey;
    use p256::ecdsa::signature::hazmat::PrehashSigner;

    use super::*;

    fn signing_key() -> SigningKey {
        SigningKey::from_slice(&[7u8; 32]).unwrap()
    }

    #[test]
    fn parse_der_signature_simple() {
        let der = [0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02];
        let (r, s) = signature_components(&parse_der_signature(&der).unwrap());

        assert_eq!(r[31], 1);
        assert_eq!(s[31], 2);
        assert_eq!(r[0..31], [0u8; 31]);
    }

    #[test]
    fn parse_der_signature_with_leading_zero() {
        let der = [0x30, 0x08, 0x02, 0x02, 0x00, 0x80, 0x02, 0x02, 0x00, 0x90];
        let (r, s) = signature_components(&parse_der_signature(&der).unwrap());

        assert_eq!(r[31], 0x80);
        assert_eq!(s[31], 0x90);
    }

    #[test]
    fn parse_der_signature_invalid() {
        assert!(parse_der_signature(&[0x31, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02]).is_err());
        assert!(parse_der_signature(&[0x30, 0x04]).is_err());
        // zero scalar
        assert!(parse_der_signature(&[0x30, 0x06, 0x02, 0x01, 0x00, 0x02, 0x01, 0x02]).is_err());
    }

    #[test]
    fn parse_der_signature_is_strict_about_lengths() {
        // trailing byte after s
        let trailing = [0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02, 0x00];
        assert!(matches!(
            parse_der_signature(&trailing),
            Err(Error::InvalidSignature(_))
        ));

        // sequence length disagrees with content
        let short_sequence = [0x30, 0x05, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02];
        assert!(parse_der_signature(&short_sequence).is_err());
    }

    #[test]
    fn parse_p256_signature_accepts_raw_and_der() {
        let key = signing_key();
        let signature: P256Signature = key.sign_prehash(&[9u8; 32]).unwrap();

        let raw = signature.to_bytes();
        let der = signature.to_der();

        let from_raw = parse_p256_signature(&raw).unwrap();
        let from_der = parse_p256_signature(der.as_bytes()).unwrap();
        assert_eq!(from_raw, from_der);
        assert_eq!(&from_raw.0[..], &raw[..32]);
    }

    #[test]
    fn normalize_s_flips_high_s() {
        let key = signing_key();
        let signature: P256Signature = key.sign_prehash(&[3u8; 32]).unwrap();
        let (low, flipped) = normalize_s(signature);
        assert!(!flipped);
        assert_eq!(low, signature);

        let (r, s) = signature_components(&low);
        let n = U256::from_str_radix(
            "ffffffff00000000ffffffffffffffffbce6faada7179e84f3b9cac2fc632551",
            16,
        )
        .unwrap();
        let high_s = (n - U256::from_be_bytes(s)).to_be_bytes::<32>();
        let high = P256Signature::from_scalars(r, high_s).unwrap();

        let (normalized, flipped) = normalize_s(high);
        assert!(flipped);
        assert_eq!(signature_components(&normalized), (r, s));
    }

    #[test]
    fn parse_public_key_all_encodings_agree() {
        let key = signing_key();
        let uncompressed = key.verifying_key().to_encoded_point(false);
        let compressed = key.verifying_key().to_encoded_point(true);

        let from_uncompressed = parse_public_key(uncompressed.as_bytes()).unwrap();
        let from_compressed = parse_public_key(compressed.as_bytes()).unwrap();
        let from_raw = parse_public_key(&uncompressed.as_bytes()[1..]).unwrap();

        assert_eq!(from_uncompressed, from_compressed);
        assert_eq!(from_uncompressed, from_raw);
        assert_eq!(&from_uncompressed.0[..], &uncompressed.as_bytes()[1..33]);
    }

    #[test]
    fn parse_public_key_rejects_garbage() {
        assert!(matches!(
            parse_public_key(&[0u8; 65]),
            Err(Error::InvalidPublicKey(_))
        ));
        assert!(matches!(
            parse_public_key(&[1u8; 10]),
            Err(Error::InvalidPublicKey(_))
        ));
    }

    #[test]
    fn compress_public_key_is_33_bytes() {
        let key = signing_key();
        let uncompressed = key.verifying_key().to_encoded_point(false);

        let compressed = compress_public_key(uncompressed.as_bytes()).unwrap();
        assert_eq!(compressed.len(), 33);
        assert_eq!(
            parse_public_key(&compressed).unwrap(),
            parse_public_key(uncompressed.as_bytes()).unwrap()
        );
    }
}
