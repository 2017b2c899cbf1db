//! Artifact validation for `podplay-validator`.
//!
//! Every check here is textual or structural: PEM boundary markers for
//! certificates and keys, mapping shape for the user configuration. Nothing
//! parses ASN.1 or judges credential strength. A failed check aborts the
//! reload for that event before anything on disk is touched.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use podplay_core::types::{ArtifactKind, WatchedArtifact};
use serde_yaml::{Mapping, Value};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// PEM block labels accepted for TLS material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PemLabel {
    Certificate,
    PrivateKey,
    RsaPrivateKey,
    EcPrivateKey,
}

impl PemLabel {
    pub const ALL: [PemLabel; 4] = [
        PemLabel::Certificate,
        PemLabel::PrivateKey,
        PemLabel::RsaPrivateKey,
        PemLabel::EcPrivateKey,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PemLabel::Certificate => "CERTIFICATE",
            PemLabel::PrivateKey => "PRIVATE KEY",
            PemLabel::RsaPrivateKey => "RSA PRIVATE KEY",
            PemLabel::EcPrivateKey => "EC PRIVATE KEY",
        }
    }

    pub fn is_key(self) -> bool {
        !matches!(self, PemLabel::Certificate)
    }
}

/// Errors from artifact validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{path} does not exist")]
    Missing { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} contains no PEM block (expected CERTIFICATE, PRIVATE KEY or RSA PRIVATE KEY)")]
    NoPemBoundary { path: PathBuf },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("{path}: {message}")]
    Malformed { path: PathBuf, message: String },
}

// ---------------------------------------------------------------------------
// PEM
// ---------------------------------------------------------------------------

/// Validate that `path` holds a BEGIN/END pair for one of [`PemLabel::ALL`].
///
/// Returns the first label found with a matching END marker after its BEGIN.
pub fn validate_pem(path: &Path) -> Result<PemLabel, ValidationError> {
    let content = read_text(path)?;
    pem_label(&content).ok_or_else(|| ValidationError::NoPemBoundary {
        path: path.to_path_buf(),
    })
}

/// Boolean form of [`validate_pem`].
pub fn is_valid_pem(path: &Path) -> bool {
    validate_pem(path).is_ok()
}

/// Label of the first complete PEM block in `content`.
pub fn pem_label(content: &str) -> Option<PemLabel> {
    PemLabel::ALL.into_iter().find(|label| {
        let begin = format!("-----BEGIN {}-----", label.label());
        let end = format!("-----END {}-----", label.label());
        match (content.find(&begin), content.rfind(&end)) {
            (Some(b), Some(e)) => b < e,
            _ => false,
        }
    })
}

// ---------------------------------------------------------------------------
// User configuration
// ---------------------------------------------------------------------------

/// Structural check of a user configuration document.
///
/// The document must be a mapping. When `domains` is present each entry needs
/// `name` and `users`, and each user needs `username` and `password`. Entries
/// of `test_users` need `username`, `password` and `domain`. `.json` files are
/// parsed as JSON, everything else as YAML.
pub fn validate_user_config(path: &Path) -> Result<(), ValidationError> {
    let content = read_text(path)?;
    let document = parse_document(path, &content)?;
    let Value::Mapping(root) = document else {
        return Err(malformed(path, "top level is not a mapping"));
    };

    if let Some(domains) = root.get("domains") {
        let domains = as_sequence(path, domains, "domains")?;
        for (i, domain) in domains.iter().enumerate() {
            let domain = as_mapping(path, domain, &format!("domains[{i}]"))?;
            require_keys(path, domain, &["name", "users"], &format!("domains[{i}]"))?;
            let users = domain
                .get("users")
                .and_then(Value::as_sequence)
                .ok_or_else(|| malformed(path, &format!("domains[{i}].users is not a list")))?;
            for (j, user) in users.iter().enumerate() {
                let ctx = format!("domains[{i}].users[{j}]");
                let user = as_mapping(path, user, &ctx)?;
                require_keys(path, user, &["username", "password"], &ctx)?;
            }
        }
    }

    if let Some(test_users) = root.get("test_users") {
        let test_users = as_sequence(path, test_users, "test_users")?;
        for (i, user) in test_users.iter().enumerate() {
            let ctx = format!("test_users[{i}]");
            let user = as_mapping(path, user, &ctx)?;
            require_keys(path, user, &["username", "password", "domain"], &ctx)?;
        }
    }

    Ok(())
}

fn parse_document(path: &Path, content: &str) -> Result<Value, ValidationError> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if is_json {
        let json: serde_json::Value =
            serde_json::from_str(content).map_err(|e| ValidationError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        serde_yaml::to_value(json).map_err(|e| ValidationError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    } else {
        serde_yaml::from_str(content).map_err(|e| ValidationError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

fn as_sequence<'a>(
    path: &Path,
    value: &'a Value,
    ctx: &str,
) -> Result<&'a Vec<Value>, ValidationError> {
    value
        .as_sequence()
        .ok_or_else(|| malformed(path, &format!("{ctx} is not a list")))
}

fn as_mapping<'a>(path: &Path, value: &'a Value, ctx: &str) -> Result<&'a Mapping, ValidationError> {
    value
        .as_mapping()
        .ok_or_else(|| malformed(path, &format!("{ctx} is not a mapping")))
}

fn require_keys(
    path: &Path,
    mapping: &Mapping,
    keys: &[&str],
    ctx: &str,
) -> Result<(), ValidationError> {
    match keys.iter().find(|key| !mapping.contains_key(**key)) {
        Some(missing) => Err(malformed(path, &format!("{ctx} is missing '{missing}'"))),
        None => Ok(()),
    }
}

fn malformed(path: &Path, message: &str) -> ValidationError {
    ValidationError::Malformed {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Run the check appropriate to the artifact's kind.
pub fn validate_artifact(artifact: &WatchedArtifact) -> Result<(), ValidationError> {
    match artifact.kind {
        ArtifactKind::Certificate | ArtifactKind::PrivateKey => {
            validate_pem(&artifact.path).map(|_| ())
        }
        ArtifactKind::UserConfig => validate_user_config(&artifact.path),
        ArtifactKind::DkimRecord => read_text(&artifact.path).map(|_| ()),
    }
}

/// Require every path in `paths` to exist, reporting the first missing one.
pub fn require_present(paths: &[&Path]) -> Result<(), ValidationError> {
    match paths.iter().find(|p| !p.exists()) {
        Some(missing) => Err(ValidationError::Missing {
            path: missing.to_path_buf(),
        }),
        None => Ok(()),
    }
}

fn read_text(path: &Path) -> Result<String, ValidationError> {
    fs::read_to_string(path).map_err(|source| {
        if source.kind() == ErrorKind::NotFound {
            ValidationError::Missing {
                path: path.to_path_buf(),
            }
        } else {
            ValidationError::Unreadable {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}
