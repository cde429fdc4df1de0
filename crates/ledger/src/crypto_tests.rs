use super::*;

const KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

#[test]
fn round_trip_with_key() {
    let cipher = ColumnCipher::from_master_key(KEY).unwrap();
    let sealed = cipher.seal("worker --mode fast").unwrap();
    assert!(sealed.starts_with("aesgcm:v1:"));
    assert_ne!(sealed, "worker --mode fast");
    assert_eq!(cipher.open(&sealed), "worker --mode fast");
}

#[test]
fn nonces_differ_between_seals() {
    let cipher = ColumnCipher::from_master_key(KEY).unwrap();
    let a = cipher.seal("same").unwrap();
    let b = cipher.seal("same").unwrap();
    assert_ne!(a, b);
    assert_eq!(cipher.open(&a), cipher.open(&b));
}

#[test]
fn plaintext_policy_passes_through() {
    let cipher = ColumnCipher::plaintext();
    assert_eq!(cipher.policy(), EncryptionPolicy::Plaintext);
    assert_eq!(cipher.seal("value").unwrap(), "value");
    assert_eq!(cipher.open("value"), "value");
}

#[test]
fn plaintext_rows_readable_after_enabling_encryption() {
    let cipher = ColumnCipher::from_master_key(KEY).unwrap();
    assert_eq!(cipher.open("legacy plaintext row"), "legacy plaintext row");
}

#[test]
fn lost_key_degrades_to_marker_not_leak() {
    let cipher = ColumnCipher::from_master_key(KEY).unwrap();
    let sealed = cipher.seal("sanitized command").unwrap();

    let other = ColumnCipher::from_master_key(
        "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
    )
    .unwrap();
    assert_eq!(other.open(&sealed), UNRECOVERABLE);
    assert_eq!(ColumnCipher::plaintext().open(&sealed), UNRECOVERABLE);
}

#[yare::parameterized(
    short = { "abcd" },
    long = { "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f00" },
    not_hex = { "zz0102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f" },
)]
fn invalid_master_keys_rejected(key: &str) {
    assert!(matches!(
        ColumnCipher::from_master_key(key),
        Err(LedgerError::MasterKey(_))
    ));
}

#[test]
fn garbage_ciphertext_is_unrecoverable() {
    let cipher = ColumnCipher::from_master_key(KEY).unwrap();
    assert_eq!(cipher.open("aesgcm:v1:nothex"), UNRECOVERABLE);
    assert_eq!(cipher.open("aesgcm:v1:00:00"), UNRECOVERABLE);
}
