//! DKIM public-record extraction and TXT rendering.

use std::sync::OnceLock;

use regex::Regex;

/// Comment line that opens the managed DKIM block in a zone file.
pub const DKIM_MARKER: &str = "; DKIM - Domain Keys Identified Mail";

/// Owner name of the published record (selector `default`).
pub const DKIM_OWNER: &str = "default._domainkey";

/// Maximum length of one character-string in a TXT record.
pub const TXT_CHUNK_LEN: usize = 255;

/// Tag list preceding the `p=` key material.
const DKIM_TAGS: &str = "v=DKIM1; h=sha256; k=rsa; t=y; p=";

fn quoted_fragment() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""([^"]*)""#).expect("quoted fragment regex"))
}

fn public_key_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"p=([A-Za-z0-9+/=]+)").expect("p= tag regex"))
}

/// Every quoted character-string in `text`, in order.
pub fn quoted_fragments(text: &str) -> Vec<String> {
    quoted_fragment()
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect()
}

/// Pull the base64 `p=` payload out of a generator's `default.txt`.
///
/// The record may span several lines; all quoted fragments are concatenated
/// before the tag is located.
pub fn extract_public_key(record_text: &str) -> Option<String> {
    let joined = quoted_fragments(record_text).concat();
    public_key_tag()
        .captures(&joined)
        .map(|c| c[1].to_string())
}

/// Split `key` into quoted-string sized pieces of at most [`TXT_CHUNK_LEN`].
pub fn chunk_key(key: &str) -> Vec<String> {
    key.chars()
        .collect::<Vec<_>>()
        .chunks(TXT_CHUNK_LEN)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// Render the TXT record lines for `key`.
///
/// ```text
/// default._domainkey IN TXT ( "v=DKIM1; h=sha256; k=rsa; t=y; p="
///     "<first 255 chars>"
///     "<rest>"
///     )
/// ```
///
/// The tag list is its own character-string so that the key fragments
/// concatenate to exactly the key.
pub fn render_record(key: &str) -> Vec<String> {
    let mut lines = vec![format!("{DKIM_OWNER} IN TXT ( \"{DKIM_TAGS}\"")];
    lines.extend(chunk_key(key).into_iter().map(|c| format!("    \"{c}\"")));
    lines.push("    )".to_string());
    lines
}

/// Key fragments of a rendered record: every quoted string after the tag list.
pub fn record_key_fragments(record_text: &str) -> Vec<String> {
    quoted_fragments(record_text)
        .into_iter()
        .skip_while(|f| !f.ends_with("p="))
        .skip(1)
        .collect()
}
