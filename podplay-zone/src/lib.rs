//! # podplay-zone
//!
//! Text surgery on BIND master files: SOA serial bumps and the DKIM TXT
//! record block.
//!
//! Call [`patch_zone`] to apply both edits to a zone file's contents, or use
//! [`ZoneText`] directly for finer control. Everything here is pure string
//! manipulation; callers own the file I/O.

pub mod dkim;
pub mod error;
pub mod serial;
pub mod zone;

pub use dkim::{
    chunk_key, extract_public_key, record_key_fragments, render_record, DKIM_MARKER, TXT_CHUNK_LEN,
};
pub use error::ZoneError;
pub use serial::next_serial;
pub use zone::{patch_zone, DkimEdit, ZonePatch, ZoneText, MAIL_RECORDS_ANCHOR};
