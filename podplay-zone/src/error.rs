//! Error types for podplay-zone.

use thiserror::Error;

/// All errors that can arise while patching zone text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ZoneError {
    /// No `NNNNNNNNNN ; Serial` line in the zone.
    #[error("zone has no serial number annotated with '; Serial'")]
    SerialNotFound,

    /// The serial is not a 10-digit `YYYYMMDDnn` value.
    #[error("serial '{0}' is not in YYYYMMDDnn form")]
    InvalidSerial(String),
}
