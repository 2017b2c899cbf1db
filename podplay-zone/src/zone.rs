//! Line-oriented editing of a zone file's serial and DKIM block.
//!
//! ## DKIM block
//!
//! The managed block is the [`DKIM_MARKER`] comment, any comment lines that
//! directly follow it (placeholders), and the `default._domainkey` record that
//! follows those, including continuation lines up to the closing parenthesis.
//!
//! 1. Marker present → the whole block is replaced.
//! 2. No marker but a `default._domainkey` record → that record is replaced
//!    by marker + new record.
//! 3. Neither → marker + record are inserted before the
//!    `; Additional mail-related records` comment, or appended at the end.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::dkim::{record_key_fragments, render_record, DKIM_MARKER, DKIM_OWNER};
use crate::error::ZoneError;
use crate::serial::next_serial;

/// Comment that introduces trailing mail records; new DKIM blocks go before it.
pub const MAIL_RECORDS_ANCHOR: &str = "; Additional mail-related records";

fn serial_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{10})\s*;\s*[Ss]erial").expect("serial regex"))
}

/// How the DKIM block was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DkimEdit {
    /// An existing block or record was rewritten in place.
    Replaced,
    /// No block existed; one was added.
    Inserted,
}

/// Zone file contents under edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneText {
    lines: Vec<String>,
}

impl ZoneText {
    pub fn parse(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
        }
    }

    /// The annotated SOA serial, if any.
    pub fn serial(&self) -> Option<String> {
        self.lines
            .iter()
            .find_map(|line| serial_line().captures(line).map(|c| c[1].to_string()))
    }

    /// Replace the annotated serial with its successor for `today`.
    ///
    /// Returns `(old, new)`.
    pub fn bump_serial(&mut self, today: NaiveDate) -> Result<(String, String), ZoneError> {
        for line in &mut self.lines {
            let Some(found) = serial_line().captures(line).and_then(|c| c.get(1)) else {
                continue;
            };
            let old = found.as_str().to_string();
            let new = next_serial(&old, today)?;
            line.replace_range(found.range(), &new);
            return Ok((old, new));
        }
        Err(ZoneError::SerialNotFound)
    }

    /// Replace or insert the DKIM block so it publishes `public_key`.
    pub fn upsert_dkim(&mut self, public_key: &str) -> DkimEdit {
        let mut block = vec![DKIM_MARKER.to_string()];
        block.extend(render_record(public_key));

        if let Some(start) = self.lines.iter().position(|l| is_marker(l)) {
            let end = self.block_end(start);
            self.lines.splice(start..end, block);
            return DkimEdit::Replaced;
        }

        if let Some(start) = self.lines.iter().position(|l| is_dkim_owner(l)) {
            let end = record_end(&self.lines, start) + 1;
            self.lines.splice(start..end, block);
            return DkimEdit::Replaced;
        }

        match self
            .lines
            .iter()
            .position(|l| l.trim_start().starts_with(MAIL_RECORDS_ANCHOR))
        {
            Some(anchor) => {
                block.push(String::new());
                self.lines.splice(anchor..anchor, block);
            }
            None => {
                while self.lines.last().is_some_and(|l| l.trim().is_empty()) {
                    self.lines.pop();
                }
                self.lines.push(String::new());
                self.lines.extend(block);
            }
        }
        DkimEdit::Inserted
    }

    /// Key fragments published by the managed DKIM block.
    pub fn dkim_key_fragments(&self) -> Option<Vec<String>> {
        let start = self.lines.iter().position(|l| is_marker(l))?;
        let end = self.block_end(start);
        let fragments = record_key_fragments(&self.lines[start..end].join("\n"));
        if fragments.is_empty() {
            None
        } else {
            Some(fragments)
        }
    }

    /// Number of DKIM marker comments (a well-formed zone has at most one).
    pub fn dkim_block_count(&self) -> usize {
        self.lines.iter().filter(|l| is_marker(l)).count()
    }

    /// Exclusive end of the block starting at the marker line `start`.
    /// Blank lines inside the block are consumed only when a DKIM record
    /// follows them; trailing blanks stay with the rest of the zone.
    fn block_end(&self, start: usize) -> usize {
        let mut end = start + 1;
        let mut i = end;
        while i < self.lines.len() {
            let trimmed = self.lines[i].trim_start();
            if trimmed.is_empty() {
                i += 1;
            } else if trimmed.starts_with(';') && !trimmed.starts_with(MAIL_RECORDS_ANCHOR) {
                i += 1;
                end = i;
            } else {
                break;
            }
        }
        if i < self.lines.len() && is_dkim_owner(&self.lines[i]) {
            end = record_end(&self.lines, i) + 1;
        }
        end
    }

    pub fn render(&self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}

fn is_marker(line: &str) -> bool {
    line.trim_start().starts_with(DKIM_MARKER)
}

fn is_dkim_owner(line: &str) -> bool {
    line.split_whitespace()
        .next()
        .is_some_and(|owner| owner.starts_with(DKIM_OWNER))
}

/// Index of the last line of the record starting at `start`, following
/// parentheses outside quotes and comments.
fn record_end(lines: &[String], start: usize) -> usize {
    let mut depth: i32 = 0;
    for (offset, line) in lines[start..].iter().enumerate() {
        let mut in_quotes = false;
        for ch in line.chars() {
            match ch {
                '"' => in_quotes = !in_quotes,
                ';' if !in_quotes => break,
                '(' if !in_quotes => depth += 1,
                ')' if !in_quotes => depth -= 1,
                _ => {}
            }
        }
        if depth <= 0 {
            return start + offset;
        }
    }
    lines.len() - 1
}

/// Result of [`patch_zone`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZonePatch {
    pub text: String,
    pub old_serial: String,
    pub new_serial: String,
    pub edit: DkimEdit,
}

/// Bump the serial and publish `public_key` in one pass.
pub fn patch_zone(text: &str, public_key: &str, today: NaiveDate) -> Result<ZonePatch, ZoneError> {
    let mut zone = ZoneText::parse(text);
    let (old_serial, new_serial) = zone.bump_serial(today)?;
    let edit = zone.upsert_dkim(public_key);
    Ok(ZonePatch {
        text: zone.render(),
        old_serial,
        new_serial,
        edit,
    })
}
