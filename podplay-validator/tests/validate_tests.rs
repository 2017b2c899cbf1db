use std::fs;
use std::path::PathBuf;

use podplay_core::types::{ArtifactKind, WatchedArtifact};
use podplay_validator::{
    is_valid_pem, require_present, validate_artifact, validate_pem, validate_user_config,
    PemLabel, ValidationError,
};
use rstest::rstest;
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).expect("write fixture");
    path
}

// ---------------------------------------------------------------------------
// PEM
// ---------------------------------------------------------------------------

#[rstest]
#[case("CERTIFICATE", PemLabel::Certificate)]
#[case("PRIVATE KEY", PemLabel::PrivateKey)]
#[case("RSA PRIVATE KEY", PemLabel::RsaPrivateKey)]
fn recognised_pem_blocks_validate(#[case] label: &str, #[case] expected: PemLabel) {
    let dir = TempDir::new().expect("tempdir");
    let body = format!("-----BEGIN {label}-----\nMIIBszCCAVmgAwIBAgIU\n-----END {label}-----\n");
    let path = write(&dir, "file.pem", &body);
    assert_eq!(validate_pem(&path).expect("valid"), expected);
    assert!(is_valid_pem(&path));
}

#[test]
fn full_chain_with_several_certificates_validates() {
    let dir = TempDir::new().expect("tempdir");
    let block = "-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n";
    let path = write(&dir, "fullchain.pem", &format!("{block}{block}{block}"));
    assert!(is_valid_pem(&path));
}

#[rstest]
#[case("")]
#[case("not a certificate at all\n")]
#[case("-----BEGIN PUBLIC KEY-----\nAAAA\n-----END PUBLIC KEY-----\n")]
#[case("-----BEGIN CERTIFICATE-----\nAAAA\n-----END PRIVATE KEY-----\n")]
fn files_without_recognised_pair_are_rejected(#[case] body: &str) {
    let dir = TempDir::new().expect("tempdir");
    let path = write(&dir, "broken.pem", body);
    let err = validate_pem(&path).unwrap_err();
    assert!(matches!(err, ValidationError::NoPemBoundary { .. }), "got: {err}");
    assert!(!is_valid_pem(&path));
}

#[test]
fn missing_pem_file_is_reported_as_missing() {
    let dir = TempDir::new().expect("tempdir");
    let err = validate_pem(&dir.path().join("absent.pem")).unwrap_err();
    assert!(matches!(err, ValidationError::Missing { .. }), "got: {err}");
}

// ---------------------------------------------------------------------------
// User configuration
// ---------------------------------------------------------------------------

#[test]
fn well_formed_user_config_validates() {
    let dir = TempDir::new().expect("tempdir");
    let path = write(
        &dir,
        "users.yaml",
        "domains:\n  - name: example.org\n    users:\n      - username: alice\n        password: x\ntest_users:\n  - username: bob\n    domain: example.org\n    password: y\n",
    );
    validate_user_config(&path).expect("valid");
}

#[test]
fn mapping_without_domains_is_accepted() {
    let dir = TempDir::new().expect("tempdir");
    let path = write(&dir, "users.yaml", "version: \"1.0\"\n");
    validate_user_config(&path).expect("valid");
}

#[rstest]
#[case("- just\n- a list\n", "not a mapping")]
#[case("domains:\n  - users: []\n", "missing 'name'")]
#[case("domains:\n  - name: a.org\n", "missing 'users'")]
#[case("domains:\n  - name: a.org\n    users:\n      - username: alice\n", "missing 'password'")]
#[case("domains:\n  - name: a.org\n    users:\n      - password: x\n", "missing 'username'")]
#[case("test_users:\n  - username: bob\n    password: y\n", "missing 'domain'")]
fn structural_problems_are_reported(#[case] body: &str, #[case] needle: &str) {
    let dir = TempDir::new().expect("tempdir");
    let path = write(&dir, "users.yaml", body);
    let err = validate_user_config(&path).unwrap_err();
    assert!(err.to_string().contains(needle), "expected '{needle}', got: {err}");
}

#[test]
fn unparseable_yaml_is_a_parse_error() {
    let dir = TempDir::new().expect("tempdir");
    let path = write(&dir, "users.yaml", "domains: [unclosed\n");
    let err = validate_user_config(&path).unwrap_err();
    assert!(matches!(err, ValidationError::Parse { .. }), "got: {err}");
}

#[test]
fn json_user_config_is_parsed_as_json() {
    let dir = TempDir::new().expect("tempdir");
    let good = write(
        &dir,
        "users.json",
        r#"{"domains":[{"name":"a.org","users":[{"username":"alice","password":"x"}]}]}"#,
    );
    validate_user_config(&good).expect("valid json");

    let bad = write(&dir, "bad.json", r#"{"domains":[{"name":"a.org"}]}"#);
    assert!(validate_user_config(&bad).is_err());
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

#[test]
fn artifact_dispatch_uses_kind_specific_check() {
    let dir = TempDir::new().expect("tempdir");
    let cert = write(&dir, "fullchain.pem", "garbage");
    let artifact = WatchedArtifact::new(&cert, ArtifactKind::Certificate, None);
    assert!(validate_artifact(&artifact).is_err());

    let record = write(&dir, "default.txt", "default._domainkey IN TXT ( \"p=AAAA\" )");
    let artifact = WatchedArtifact::new(&record, ArtifactKind::DkimRecord, None);
    validate_artifact(&artifact).expect("readable record");
}

#[test]
fn require_present_names_first_missing_path() {
    let dir = TempDir::new().expect("tempdir");
    let present = write(&dir, "fullchain.pem", "x");
    let absent = dir.path().join("privkey.pem");
    let err = require_present(&[present.as_path(), absent.as_path()]).unwrap_err();
    assert!(err.to_string().contains("privkey.pem"), "got: {err}");
    require_present(&[present.as_path()]).expect("all present");
}
