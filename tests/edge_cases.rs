#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Edge-case tests for framing, envelopes, request parsing, and engine rules

use bytes::BytesMut;
use rust_decimal_macros::dec;
use secure_bank::bank::{AccountId, MemoryStore, NewAccount, TransactionEngine};
use secure_bank::config::{MAGIC_BYTES, MAX_PAYLOAD_SIZE, PROTOCOL_VERSION};
use secure_bank::core::codec::PacketCodec;
use secure_bank::core::packet::Packet;
use secure_bank::core::wire::{WireCodec, WireMessage};
use secure_bank::error::{constants, BankError};
use secure_bank::protocol::message::{Request, RequestKind, Response};
use secure_bank::utils::crypto::{SymmetricCipher, BLOCK_SIZE};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::codec::{Decoder, Encoder};

fn mapping(value: Value) -> WireMessage {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

fn engine() -> (TransactionEngine, AccountId) {
    let engine = TransactionEngine::new(
        Arc::new(MemoryStore::new()),
        Arc::new(SymmetricCipher::from_passphrase("edge-cases")),
    );
    let id = engine
        .open_account(NewAccount {
            name: "Bob Jones".into(),
            account_number: "2345-6789-0123".into(),
            opening_balance: dec!(2500.75),
            username: "bob".into(),
            secret: "hunter2".into(),
        })
        .expect("open")
        .account_id;
    (engine, id)
}

// ============================================================================
// PACKET EDGE CASES
// ============================================================================

#[test]
fn test_packet_empty_payload() {
    let bytes = Packet::new(vec![]).to_bytes();
    let decoded = Packet::from_bytes(&bytes).expect("Should decode empty payload");
    assert!(decoded.payload.is_empty());
    assert_eq!(decoded.version, PROTOCOL_VERSION);
}

#[test]
fn test_packet_oversized_claim_rejected() {
    let mut bad = MAGIC_BYTES.to_vec();
    bad.push(PROTOCOL_VERSION);
    bad.extend_from_slice(&(20_000_000_u32).to_be_bytes());
    bad.extend_from_slice(&[0xFF; 10]);

    match Packet::from_bytes(&bad) {
        Err(BankError::OversizedPacket(20_000_000)) => {}
        other => panic!("Unexpected result: {other:?}"),
    }
}

#[test]
fn test_packet_truncated_payload() {
    let mut bytes = Packet::new(vec![1, 2, 3, 4]).to_bytes();
    bytes.truncate(bytes.len() - 1);
    assert!(matches!(
        Packet::from_bytes(&bytes),
        Err(BankError::InvalidHeader)
    ));
}

#[test]
fn test_packet_unknown_version() {
    let mut bytes = Packet::new(vec![7]).to_bytes();
    bytes[4] = 99;
    assert!(matches!(
        Packet::from_bytes(&bytes),
        Err(BankError::UnsupportedVersion(99))
    ));
}

#[test]
fn test_codec_custom_limit() {
    let mut codec = PacketCodec::new(32);
    let mut buf = BytesMut::new();

    assert!(codec.encode(Packet::new(vec![0; 32]), &mut buf).is_ok());
    assert!(codec.decode(&mut buf).unwrap().is_some());

    let err = codec.encode(Packet::new(vec![0; 33]), &mut buf).unwrap_err();
    assert!(matches!(err, BankError::OversizedPacket(33)));
}

#[test]
fn test_codec_waits_for_header() {
    let mut codec = PacketCodec::default();
    assert_eq!(codec.max_payload(), MAX_PAYLOAD_SIZE);

    let mut buf = BytesMut::from(&MAGIC_BYTES[..3]);
    assert!(codec.decode(&mut buf).unwrap().is_none());
}

// ============================================================================
// ENVELOPE EDGE CASES
// ============================================================================

#[test]
fn test_envelope_shorter_than_iv() {
    let cipher = SymmetricCipher::from_passphrase("k");
    let err = cipher.decrypt(&[0u8; BLOCK_SIZE - 1]).unwrap_err();
    assert!(matches!(err, BankError::Decryption(constants::ERR_SHORT_ENVELOPE)));
}

#[test]
fn test_envelope_iv_only() {
    let cipher = SymmetricCipher::from_passphrase("k");
    let err = cipher.decrypt(&[0u8; BLOCK_SIZE]).unwrap_err();
    assert!(matches!(err, BankError::Decryption(_)));
}

#[test]
fn test_envelope_misaligned() {
    let cipher = SymmetricCipher::from_passphrase("k");
    let mut envelope = cipher.encrypt(b"balance").unwrap();
    envelope.push(0);
    let err = cipher.decrypt(&envelope).unwrap_err();
    assert!(matches!(
        err,
        BankError::Decryption(constants::ERR_MISALIGNED_CIPHERTEXT)
    ));
}

#[test]
fn test_empty_plaintext_is_one_block() {
    let cipher = SymmetricCipher::from_passphrase("k");
    let envelope = cipher.encrypt(b"").unwrap();
    assert_eq!(envelope.len(), 2 * BLOCK_SIZE);
    assert!(cipher.decrypt(&envelope).unwrap().is_empty());
}

#[test]
fn test_wire_rejects_non_object_and_nested() {
    let wire = WireCodec::plain();
    assert!(matches!(wire.decode(b"[1,2,3]"), Err(BankError::Codec(_))));
    assert!(matches!(
        wire.decode(br#"{"action":"login","extra":{"a":1}}"#),
        Err(BankError::Codec(_))
    ));
    assert!(matches!(wire.decode(b"not json"), Err(BankError::Codec(_))));
}

#[test]
fn test_encrypted_wire_rejects_plain_json() {
    let wire = WireCodec::encrypted(Arc::new(SymmetricCipher::from_passphrase("k")));
    let err = wire.decode(br#"{"action":"login"}"#).unwrap_err();
    assert!(err.closes_connection());
}

// ============================================================================
// REQUEST PARSING EDGE CASES
// ============================================================================

#[test]
fn test_unknown_action_is_validation_error() {
    let err = Request::from_wire(&mapping(json!({"action": "transfer"}))).unwrap_err();
    assert_eq!(err.client_message(), constants::ERR_INVALID_ACTION);
    assert!(!err.closes_connection());
}

#[test]
fn test_missing_fields_are_validation_errors() {
    for value in [
        json!({}),
        json!({"action": "login", "username": "bob"}),
        json!({"action": "deposit", "amount": "5.00"}),
        json!({"action": "withdraw", "account_id": 1}),
        json!({"action": "balance", "account_id": "one"}),
        json!({"action": "deposit", "account_id": 1, "amount": "lots"}),
    ] {
        let err = Request::from_wire(&mapping(value.clone())).unwrap_err();
        assert!(matches!(err, BankError::Validation(_)), "{value}: {err:?}");
    }
}

#[test]
fn test_amount_accepts_string_and_number() {
    let from_string =
        Request::from_wire(&mapping(json!({"action": "deposit", "account_id": 1, "amount": "100.25"})))
            .unwrap();
    let from_number =
        Request::from_wire(&mapping(json!({"action": "deposit", "account_id": 1, "amount": 100.25})))
            .unwrap();
    assert_eq!(from_string, from_number);
}

#[test]
fn test_error_response_reads_for_any_kind() {
    let map = mapping(json!({"status": "error", "message": "Insufficient funds"}));
    for kind in [RequestKind::Login, RequestKind::Withdraw, RequestKind::Logout] {
        assert_eq!(
            Response::from_wire(kind, &map).unwrap(),
            Response::error("Insufficient funds")
        );
    }
}

#[test]
fn test_unknown_status_is_codec_error() {
    let map = mapping(json!({"status": "maybe"}));
    assert!(matches!(
        Response::from_wire(RequestKind::Balance, &map),
        Err(BankError::Codec(_))
    ));
}

#[test]
fn test_login_debug_hides_secret() {
    let request = Request::Login {
        username: "bob".into(),
        secret: "hunter2".into(),
    };
    assert!(!format!("{request:?}").contains("hunter2"));
}

// ============================================================================
// ENGINE EDGE CASES
// ============================================================================

#[test]
fn test_zero_and_negative_amounts_rejected() {
    let (engine, id) = engine();
    for amount in [dec!(0), dec!(-1), dec!(-0.01)] {
        let err = engine.deposit(id, amount).unwrap_err();
        assert_eq!(err.client_message(), constants::ERR_INVALID_DEPOSIT);
        let err = engine.withdraw(id, amount).unwrap_err();
        assert_eq!(err.client_message(), constants::ERR_INVALID_WITHDRAWAL);
    }
    assert_eq!(engine.get_balance(id).unwrap().balance, dec!(2500.75));
    assert!(engine.transactions(id).unwrap().is_empty());
}

#[test]
fn test_withdraw_exact_balance_leaves_zero() {
    let (engine, id) = engine();
    assert_eq!(engine.withdraw(id, dec!(2500.75)).unwrap(), dec!(0));
    let err = engine.withdraw(id, dec!(0.01)).unwrap_err();
    assert!(matches!(err, BankError::InsufficientFunds));
}

#[test]
fn test_unknown_account() {
    let (engine, id) = engine();
    let missing = AccountId::new(id.get() + 100);
    let err = engine.get_balance(missing).unwrap_err();
    assert_eq!(err.client_message(), constants::ERR_ACCOUNT_NOT_FOUND);
    assert!(engine.deposit(missing, dec!(1)).is_err());
}

#[test]
fn test_unknown_user_and_wrong_secret_look_alike() {
    let (engine, _) = engine();
    let unknown = engine.login("mallory", "hunter2").unwrap_err();
    let wrong = engine.login("bob", "hunter3").unwrap_err();
    assert_eq!(unknown.client_message(), wrong.client_message());
    assert_eq!(unknown.client_message(), constants::ERR_INVALID_CREDENTIALS);
}

#[test]
fn test_duplicate_username_rejected() {
    let (engine, _) = engine();
    let err = engine
        .open_account(NewAccount {
            name: "Other Bob".into(),
            account_number: "9999-0000-1111".into(),
            opening_balance: dec!(1),
            username: "bob".into(),
            secret: "x".into(),
        })
        .unwrap_err();
    assert!(matches!(err, BankError::Validation(_)));
}

#[test]
fn test_negative_opening_balance_rejected() {
    let (engine, _) = engine();
    let err = engine
        .open_account(NewAccount {
            name: "Carol".into(),
            account_number: "3456-7890-1234".into(),
            opening_balance: dec!(-5),
            username: "carol".into(),
            secret: "pw".into(),
        })
        .unwrap_err();
    assert!(matches!(err, BankError::Validation(_)));
}
