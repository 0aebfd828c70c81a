//! Local transaction signing.
//!
//! Transactions are serialized in the chain's binary layout, hashed together
//! with the chain id and signed with a compact recoverable secp256k1
//! signature. Nodes only accept "canonical" signatures, so signing is
//! repeated with fresh nonce data until one comes out canonical.

use std::collections::HashMap;
use std::fmt;

use secp256k1::{All, Message, Secp256k1, SecretKey};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use silentbot_core::{Credentials, Error, Result};

use crate::types::{format_chain_time, Action};

/// Mainnet chain id.
pub const CHAIN_ID: [u8; 32] = {
    let mut id = [0u8; 32];
    id[0] = 0xbe;
    id[1] = 0xea;
    id[2] = 0xb0;
    id[3] = 0xde;
    id
};

/// How long a signed transaction stays valid.
pub const EXPIRATION_SECS: i64 = 60;

const WIF_VERSION: u8 = 0x80;
const MAX_SIGNING_ATTEMPTS: u64 = 256;

const VOTE_OPERATION_ID: u64 = 0;
const COMMENT_OPERATION_ID: u64 = 1;

fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Decode a base58check WIF private key.
pub fn decode_wif(wif: &str) -> Result<SecretKey> {
    let raw = bs58::decode(wif.trim())
        .into_vec()
        .map_err(|e| Error::Signing(format!("invalid base58: {}", e)))?;
    if raw.len() != 37 || raw[0] != WIF_VERSION {
        return Err(Error::Signing("not a WIF private key".into()));
    }
    let checksum = sha256(&sha256(&raw[..33]));
    if checksum[..4] != raw[33..] {
        return Err(Error::Signing("WIF checksum mismatch".into()));
    }
    SecretKey::from_slice(&raw[1..33]).map_err(|e| Error::Signing(e.to_string()))
}

/// Reference block and expiry binding a transaction to recent chain state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionHeader {
    pub ref_block_num: u16,
    pub ref_block_prefix: u32,
    /// Unix seconds.
    pub expiration: i64,
}

impl TransactionHeader {
    /// Build from the head block number, head block id (hex) and node time.
    pub fn new(head_block_number: u64, head_block_id: &str, head_time: i64) -> Result<Self> {
        let id = hex::decode(head_block_id)
            .map_err(|e| Error::Malformed(format!("head_block_id: {}", e)))?;
        if id.len() < 8 {
            return Err(Error::Malformed("head_block_id too short".into()));
        }
        Ok(Self {
            ref_block_num: (head_block_number & 0xffff) as u16,
            ref_block_prefix: u32::from_le_bytes([id[4], id[5], id[6], id[7]]),
            expiration: head_time + EXPIRATION_SECS,
        })
    }
}

// ---------------------------------------------------------------------------
// Binary serialization
// ---------------------------------------------------------------------------

fn write_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            return;
        }
        buf.push(byte | 0x80);
    }
}

fn write_string(buf: &mut Vec<u8>, s: &str) {
    write_varint(buf, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

fn write_action(buf: &mut Vec<u8>, action: &Action) {
    match action {
        Action::Vote(vote) => {
            write_varint(buf, VOTE_OPERATION_ID);
            write_string(buf, &vote.voter);
            write_string(buf, &vote.author);
            write_string(buf, &vote.permlink);
            buf.extend_from_slice(&vote.weight.to_le_bytes());
        }
        Action::Comment(comment) => {
            write_varint(buf, COMMENT_OPERATION_ID);
            write_string(buf, &comment.parent_author);
            write_string(buf, &comment.parent_permlink);
            write_string(buf, &comment.author);
            write_string(buf, &comment.permlink);
            write_string(buf, &comment.title);
            write_string(buf, &comment.body);
            write_string(buf, &comment.json_metadata);
        }
    }
}

/// Binary form of an unsigned single-operation transaction.
pub fn serialize_transaction(header: &TransactionHeader, action: &Action) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256);
    buf.extend_from_slice(&header.ref_block_num.to_le_bytes());
    buf.extend_from_slice(&header.ref_block_prefix.to_le_bytes());
    buf.extend_from_slice(&(header.expiration as u32).to_le_bytes());
    write_varint(&mut buf, 1);
    write_action(&mut buf, action);
    // extensions
    write_varint(&mut buf, 0);
    buf
}

/// Digest that gets signed: `sha256(chain_id ‖ transaction)`.
pub fn signing_digest(serialized: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(CHAIN_ID);
    hasher.update(serialized);
    hasher.finalize().into()
}

fn operation_json(action: &Action) -> Value {
    match action {
        Action::Vote(vote) => json!(["vote", vote]),
        Action::Comment(comment) => json!(["comment", comment]),
    }
}

// ---------------------------------------------------------------------------
// Signer
// ---------------------------------------------------------------------------

/// Holds the decoded posting keys of every voting account.
pub struct Signer {
    secp: Secp256k1<All>,
    keys: HashMap<String, SecretKey>,
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("accounts", &self.keys.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Signer {
    /// Decode every credential. Any malformed key fails the whole set.
    pub fn from_credentials(credentials: &Credentials) -> Result<Self> {
        let mut keys = HashMap::new();
        for account in credentials.accounts() {
            let wif = credentials
                .get(account)
                .ok_or_else(|| Error::Config(format!("no key for {}", account)))?;
            let key = decode_wif(wif)
                .map_err(|e| Error::Config(format!("key for {}: {}", account, e)))?;
            keys.insert(account.to_string(), key);
        }
        Ok(Self {
            secp: Secp256k1::new(),
            keys,
        })
    }

    pub fn has_key(&self, account: &str) -> bool {
        self.keys.contains_key(account)
    }

    /// Sign `action` and return the transaction in node JSON form.
    pub fn sign(&self, header: &TransactionHeader, action: &Action) -> Result<Value> {
        let key = self
            .keys
            .get(action.signer())
            .ok_or_else(|| Error::Signing(format!("no key for {}", action.signer())))?;
        let digest = signing_digest(&serialize_transaction(header, action));
        let signature = self.sign_digest(&digest, key)?;

        Ok(json!({
            "ref_block_num": header.ref_block_num,
            "ref_block_prefix": header.ref_block_prefix,
            "expiration": format_chain_time(header.expiration),
            "operations": [operation_json(action)],
            "extensions": [],
            "signatures": [hex::encode(signature)],
        }))
    }

    /// 65-byte signature: recovery header byte followed by compact `r ‖ s`.
    fn sign_digest(&self, digest: &[u8; 32], key: &SecretKey) -> Result<[u8; 65]> {
        let message = Message::from_digest(*digest);
        for attempt in 0..MAX_SIGNING_ATTEMPTS {
            let signature = if attempt == 0 {
                self.secp.sign_ecdsa_recoverable(&message, key)
            } else {
                let mut nonce = [0u8; 32];
                nonce[..8].copy_from_slice(&attempt.to_le_bytes());
                self.secp
                    .sign_ecdsa_recoverable_with_noncedata(&message, key, &nonce)
            };
            let (recovery_id, compact) = signature.serialize_compact();
            if !is_canonical(&compact) {
                continue;
            }
            let mut out = [0u8; 65];
            // compressed-key recovery header
            out[0] = (recovery_id.to_i32() + 31) as u8;
            out[1..].copy_from_slice(&compact);
            return Ok(out);
        }
        Err(Error::Signing("no canonical signature found".into()))
    }
}

fn is_canonical(c: &[u8; 64]) -> bool {
    c[0] & 0x80 == 0
        && !(c[0] == 0 && c[1] & 0x80 == 0)
        && c[32] & 0x80 == 0
        && !(c[32] == 0 && c[33] & 0x80 == 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CommentOperation, VoteOperation};
    use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
    use secp256k1::PublicKey;

    fn encode_wif(key: &[u8; 32]) -> String {
        let mut raw = vec![WIF_VERSION];
        raw.extend_from_slice(key);
        let checksum = sha256(&sha256(&raw));
        raw.extend_from_slice(&checksum[..4]);
        bs58::encode(raw).into_string()
    }

    fn vote() -> Action {
        Action::Vote(VoteOperation {
            voter: "silentbot".into(),
            author: "alice".into(),
            permlink: "hello".into(),
            weight: -5000,
        })
    }

    fn header() -> TransactionHeader {
        TransactionHeader {
            ref_block_num: 0x1234,
            ref_block_prefix: 0xdeadbeef,
            expiration: 1_622_550_600,
        }
    }

    #[test]
    fn test_wif_round_trip() {
        let key = [7u8; 32];
        let decoded = decode_wif(&encode_wif(&key)).unwrap();
        assert_eq!(decoded.secret_bytes(), key);
    }

    #[test]
    fn test_wif_rejects_bad_checksum() {
        let mut wif = encode_wif(&[7u8; 32]).into_bytes();
        let last = wif.len() - 1;
        wif[last] = if wif[last] == b'2' { b'3' } else { b'2' };
        let wif = String::from_utf8(wif).unwrap();
        assert!(decode_wif(&wif).is_err());
        assert!(decode_wif("0OIl").is_err());
        assert!(decode_wif("").is_err());
    }

    #[test]
    fn test_header_from_head_block() {
        let header =
            TransactionHeader::new(0x0123_4567, "0123456789abcdef0011223344556677", 1_000).unwrap();
        assert_eq!(header.ref_block_num, 0x4567);
        assert_eq!(header.ref_block_prefix, u32::from_le_bytes([0x89, 0xab, 0xcd, 0xef]));
        assert_eq!(header.expiration, 1_000 + EXPIRATION_SECS);
        assert!(TransactionHeader::new(1, "abcd", 0).is_err());
        assert!(TransactionHeader::new(1, "zz", 0).is_err());
    }

    #[test]
    fn test_varint() {
        let mut buf = Vec::new();
        write_varint(&mut buf, 0);
        write_varint(&mut buf, 127);
        write_varint(&mut buf, 300);
        assert_eq!(buf, vec![0x00, 0x7f, 0xac, 0x02]);
    }

    #[test]
    fn test_vote_serialization() {
        let bytes = serialize_transaction(&header(), &vote());
        let mut expected = vec![0x34, 0x12, 0xef, 0xbe, 0xad, 0xde];
        expected.extend_from_slice(&1_622_550_600u32.to_le_bytes());
        expected.extend_from_slice(&[1, 0]);
        expected.push(9);
        expected.extend_from_slice(b"silentbot");
        expected.push(5);
        expected.extend_from_slice(b"alice");
        expected.push(5);
        expected.extend_from_slice(b"hello");
        expected.extend_from_slice(&(-5000i16).to_le_bytes());
        expected.push(0);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_comment_serialization_uses_operation_id_one() {
        let comment = Action::Comment(CommentOperation {
            parent_author: "alice".into(),
            parent_permlink: "hello".into(),
            author: "silentbot".into(),
            permlink: "alice-hello-silentbot".into(),
            title: String::new(),
            body: "body".into(),
            json_metadata: "{}".into(),
        });
        let bytes = serialize_transaction(&header(), &comment);
        assert_eq!(bytes[10], 1);
        assert_eq!(bytes[11], COMMENT_OPERATION_ID as u8);
        assert_eq!(*bytes.last().unwrap(), 0);
    }

    #[test]
    fn test_signature_is_canonical_and_recoverable() {
        let key = [0x42u8; 32];
        let credentials = Credentials::from_lookup(&["silentbot".to_string()], |_| {
            Some(encode_wif(&key))
        })
        .unwrap();
        let signer = Signer::from_credentials(&credentials).unwrap();
        assert!(signer.has_key("silentbot"));

        let tx = signer.sign(&header(), &vote()).unwrap();
        assert_eq!(tx["operations"][0][0], "vote");
        assert_eq!(tx["operations"][0][1]["weight"], -5000);
        assert_eq!(tx["expiration"], "2021-06-01T12:30:00");

        let sig = hex::decode(tx["signatures"][0].as_str().unwrap()).unwrap();
        assert_eq!(sig.len(), 65);
        let compact: [u8; 64] = sig[1..].try_into().unwrap();
        assert!(is_canonical(&compact));

        let recovery_id = RecoveryId::from_i32(sig[0] as i32 - 31).unwrap();
        let recoverable = RecoverableSignature::from_compact(&compact, recovery_id).unwrap();
        let digest = signing_digest(&serialize_transaction(&header(), &vote()));
        let secp = Secp256k1::new();
        let recovered = secp
            .recover_ecdsa(&Message::from_digest(digest), &recoverable)
            .unwrap();
        let expected = PublicKey::from_secret_key(&secp, &SecretKey::from_slice(&key).unwrap());
        assert_eq!(recovered, expected);
    }

    #[test]
    fn test_sign_without_key_fails() {
        let signer = Signer::from_credentials(
            &Credentials::from_lookup(&[], |_| None).unwrap(),
        )
        .unwrap();
        assert!(matches!(signer.sign(&header(), &vote()), Err(Error::Signing(_))));
    }

    #[test]
    fn test_malformed_credential_is_config_error() {
        let credentials =
            Credentials::from_lookup(&["alice".to_string()], |_| Some("garbage".into())).unwrap();
        assert!(matches!(
            Signer::from_credentials(&credentials),
            Err(Error::Config(_))
        ));
    }
}
