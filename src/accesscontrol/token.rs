//! Nested JWS-in-JWE compact serialization.
//!
//! Inner: `b64(header) . b64(payload) . b64(HMAC-SHA256)` with `alg=HS256` and a
//! random nonce in the header.
//! Outer: `b64(protected) . b64(wrapped cek) . b64(iv) . b64(ciphertext) . b64(tag)`
//! with `alg=A256GCMKW`, `enc=A256GCM`, `cty=JWT`. The content key is random per
//! token and wrapped with AES-256-GCM under the encrypting key; the key-wrap iv and
//! tag ride in the protected header, which is also the content AAD.
//!
//! Every authentication failure (unwrap, content tag, signature) is reported as
//! `CryptoFailure`; everything that fails before a key is touched is `Malformed`.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{AccessError, AccessResult};

type HmacSha256 = Hmac<Sha256>;

pub(crate) const HALF_KEY_LEN: usize = 32;
const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;
const NONCE_LEN: usize = 16;

const SIGNING_ALG: &str = "HS256";
const KEY_WRAP_ALG: &str = "A256GCMKW";
const CONTENT_ENC: &str = "A256GCM";

#[derive(Serialize, Deserialize)]
struct JwsHeader {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nonce: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct JweHeader {
    alg: String,
    enc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cty: Option<String>,
    iv: String,
    tag: String,
}

/// Signing and encrypting halves of a controller key.
pub(crate) struct TokenKeys {
    signing: [u8; HALF_KEY_LEN],
    encrypting: [u8; HALF_KEY_LEN],
}

impl TokenKeys {
    pub(crate) fn new(signing: [u8; HALF_KEY_LEN], encrypting: [u8; HALF_KEY_LEN]) -> Self {
        Self { signing, encrypting }
    }

    /// Sign `payload`, then encrypt the signed envelope.
    pub(crate) fn seal(&self, payload: &[u8]) -> AccessResult<String> {
        let jws = self.sign(payload)?;
        self.encrypt(jws.as_bytes())
    }

    /// Decrypt the outer envelope, then check the inner signature. Returns the payload.
    pub(crate) fn open(&self, token: &str) -> AccessResult<Vec<u8>> {
        let jws = self.decrypt(token)?;
        let jws = String::from_utf8(jws).map_err(|_| malformed("signed envelope is not utf-8"))?;
        self.check_signature(&jws)
    }

    fn mac(&self) -> AccessResult<HmacSha256> {
        <HmacSha256 as Mac>::new_from_slice(&self.signing).map_err(|e| AccessError::Crypto(e.to_string()))
    }

    fn sign(&self, payload: &[u8]) -> AccessResult<String> {
        let nonce: [u8; NONCE_LEN] = random_bytes()?;
        let header = JwsHeader {
            alg: SIGNING_ALG.to_string(),
            typ: Some("JWT".to_string()),
            nonce: Some(b64(&nonce)),
        };
        let signing_input = format!("{}.{}", b64(&serde_json::to_vec(&header)?), b64(payload));
        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        Ok(format!("{}.{}", signing_input, b64(&signature)))
    }

    fn check_signature(&self, jws: &str) -> AccessResult<Vec<u8>> {
        let parts: Vec<&str> = jws.split('.').collect();
        let [header_b64, payload_b64, signature_b64] = parts[..] else {
            return Err(malformed("signed envelope must have 3 parts"));
        };
        let header: JwsHeader = serde_json::from_slice(&unb64(header_b64, "signature header")?)
            .map_err(|e| malformed(format!("signature header: {e}")))?;
        if header.alg != SIGNING_ALG {
            return Err(malformed(format!("unsupported signature algorithm {}", header.alg)));
        }
        let signature = unb64(signature_b64, "signature")?;
        let payload = unb64(payload_b64, "payload")?;

        let mut mac = self.mac()?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(payload_b64.as_bytes());
        mac.verify_slice(&signature).map_err(|_| AccessError::CryptoFailure)?;
        Ok(payload)
    }

    fn encrypt(&self, plaintext: &[u8]) -> AccessResult<String> {
        let cek: [u8; HALF_KEY_LEN] = random_bytes()?;
        let wrap_iv: [u8; IV_LEN] = random_bytes()?;
        let content_iv: [u8; IV_LEN] = random_bytes()?;

        let wrapped = cipher(&self.encrypting)?
            .encrypt(Nonce::from_slice(&wrap_iv), Payload { msg: &cek, aad: &[] })
            .map_err(|_| AccessError::Crypto("key wrap failed".into()))?;
        let (wrapped_key, wrap_tag) = wrapped.split_at(wrapped.len() - TAG_LEN);

        let header = JweHeader {
            alg: KEY_WRAP_ALG.to_string(),
            enc: CONTENT_ENC.to_string(),
            cty: Some("JWT".to_string()),
            iv: b64(&wrap_iv),
            tag: b64(wrap_tag),
        };
        let protected = b64(&serde_json::to_vec(&header)?);

        let sealed = cipher(&cek)?
            .encrypt(Nonce::from_slice(&content_iv), Payload { msg: plaintext, aad: protected.as_bytes() })
            .map_err(|_| AccessError::Crypto("content encryption failed".into()))?;
        let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);

        Ok(format!("{}.{}.{}.{}.{}", protected, b64(wrapped_key), b64(&content_iv), b64(ciphertext), b64(tag)))
    }

    fn decrypt(&self, token: &str) -> AccessResult<Vec<u8>> {
        let parts: Vec<&str> = token.split('.').collect();
        let [protected, wrapped_b64, iv_b64, ciphertext_b64, tag_b64] = parts[..] else {
            return Err(malformed(format!("encrypted envelope must have 5 parts, got {}", parts.len())));
        };
        let header: JweHeader = serde_json::from_slice(&unb64(protected, "protected header")?)
            .map_err(|e| malformed(format!("protected header: {e}")))?;
        if header.alg != KEY_WRAP_ALG || header.enc != CONTENT_ENC {
            return Err(malformed(format!("unsupported algorithms alg={} enc={}", header.alg, header.enc)));
        }

        let wrap_iv = fixed::<IV_LEN>(unb64(&header.iv, "key wrap iv")?, "key wrap iv")?;
        let wrap_tag = fixed::<TAG_LEN>(unb64(&header.tag, "key wrap tag")?, "key wrap tag")?;
        let content_iv = fixed::<IV_LEN>(unb64(iv_b64, "iv")?, "iv")?;
        let tag = fixed::<TAG_LEN>(unb64(tag_b64, "tag")?, "tag")?;
        let mut wrapped = unb64(wrapped_b64, "encrypted key")?;
        let mut sealed = unb64(ciphertext_b64, "ciphertext")?;

        wrapped.extend_from_slice(&wrap_tag);
        let cek = cipher(&self.encrypting)?
            .decrypt(Nonce::from_slice(&wrap_iv), Payload { msg: &wrapped, aad: &[] })
            .map_err(|_| AccessError::CryptoFailure)?;
        if cek.len() != HALF_KEY_LEN {
            return Err(AccessError::CryptoFailure);
        }

        sealed.extend_from_slice(&tag);
        cipher(&cek)?
            .decrypt(Nonce::from_slice(&content_iv), Payload { msg: &sealed, aad: protected.as_bytes() })
            .map_err(|_| AccessError::CryptoFailure)
    }
}

fn cipher(key: &[u8]) -> AccessResult<Aes256Gcm> {
    Aes256Gcm::new_from_slice(key).map_err(|e| AccessError::Crypto(e.to_string()))
}

fn random_bytes<const N: usize>() -> AccessResult<[u8; N]> {
    let mut buf = [0u8; N];
    getrandom::getrandom(&mut buf).map_err(|e| AccessError::Crypto(e.to_string()))?;
    Ok(buf)
}

fn b64(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

fn unb64(s: &str, what: &str) -> AccessResult<Vec<u8>> {
    URL_SAFE_NO_PAD.decode(s).map_err(|e| malformed(format!("{what}: {e}")))
}

fn fixed<const N: usize>(bytes: Vec<u8>, what: &str) -> AccessResult<[u8; N]> {
    let len = bytes.len();
    bytes.try_into().map_err(|_| malformed(format!("{what}: expected {N} bytes, got {len}")))
}

fn malformed(msg: impl Into<String>) -> AccessError {
    AccessError::Malformed(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(seed: u8) -> TokenKeys {
        TokenKeys::new([seed; HALF_KEY_LEN], [seed.wrapping_add(1); HALF_KEY_LEN])
    }

    fn swap_part(token: &str, index: usize, replacement: &str) -> String {
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        parts[index] = replacement.to_string();
        parts.join(".")
    }

    #[test]
    fn seal_then_open() {
        let k = keys(3);
        let token = k.seal(br#"{"uc":"hello"}"#).unwrap();
        assert_eq!(token.split('.').count(), 5);
        assert_eq!(k.open(&token).unwrap(), br#"{"uc":"hello"}"#.to_vec());
    }

    #[test]
    fn tokens_are_randomized() {
        let k = keys(3);
        assert_ne!(k.seal(b"same").unwrap(), k.seal(b"same").unwrap());
    }

    #[test]
    fn payload_is_not_visible() {
        let k = keys(3);
        let token = k.seal(b"super-secret-claims").unwrap();
        for part in token.split('.') {
            let decoded = URL_SAFE_NO_PAD.decode(part).unwrap();
            assert!(!String::from_utf8_lossy(&decoded).contains("super-secret-claims"));
        }
    }

    #[test]
    fn header_declares_algorithms() {
        let token = keys(3).seal(b"x").unwrap();
        let protected = token.split('.').next().unwrap();
        let header: serde_json::Value = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(protected).unwrap()).unwrap();
        assert_eq!(header["alg"], "A256GCMKW");
        assert_eq!(header["enc"], "A256GCM");
        assert_eq!(header["cty"], "JWT");
    }

    #[test]
    fn wrong_encrypting_key_is_crypto_failure() {
        let token = keys(3).seal(b"x").unwrap();
        assert!(matches!(keys(9).open(&token), Err(AccessError::CryptoFailure)));
    }

    #[test]
    fn wrong_signing_key_is_crypto_failure() {
        let sealer = TokenKeys::new([1; HALF_KEY_LEN], [2; HALF_KEY_LEN]);
        let opener = TokenKeys::new([5; HALF_KEY_LEN], [2; HALF_KEY_LEN]);
        let token = sealer.seal(b"x").unwrap();
        assert!(matches!(opener.open(&token), Err(AccessError::CryptoFailure)));
    }

    #[test]
    fn tampered_ciphertext_is_crypto_failure() {
        let k = keys(3);
        let token = k.seal(b"payload").unwrap();
        let ct = token.split('.').nth(3).unwrap();
        let mut bytes = URL_SAFE_NO_PAD.decode(ct).unwrap();
        bytes[0] ^= 0x01;
        let tampered = swap_part(&token, 3, &b64(&bytes));
        assert!(matches!(k.open(&tampered), Err(AccessError::CryptoFailure)));
    }

    #[test]
    fn structural_damage_is_malformed() {
        let k = keys(3);
        let token = k.seal(b"payload").unwrap();

        assert!(matches!(k.open("not-a-token"), Err(AccessError::Malformed(_))));
        assert!(matches!(k.open(&format!("{token}.extra")), Err(AccessError::Malformed(_))));
        assert!(matches!(k.open(&swap_part(&token, 2, "!!!")), Err(AccessError::Malformed(_))));
        assert!(matches!(k.open(&swap_part(&token, 2, &b64(&[0u8; 4]))), Err(AccessError::Malformed(_))));

        let bad_alg = b64(br#"{"alg":"dir","enc":"A256GCM","iv":"","tag":""}"#);
        assert!(matches!(k.open(&swap_part(&token, 0, &bad_alg)), Err(AccessError::Malformed(_))));
    }

    #[test]
    fn signature_stripped_envelope_is_malformed() {
        let k = keys(3);
        // encrypt something that is not a 3-part signed envelope
        let token = k.encrypt(b"only.two").unwrap();
        assert!(matches!(k.open(&token), Err(AccessError::Malformed(_))));
    }
}
