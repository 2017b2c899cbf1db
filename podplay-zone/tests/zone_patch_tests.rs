use chrono::NaiveDate;
use podplay_zone::{
    extract_public_key, patch_zone, DkimEdit, ZoneError, ZoneText, DKIM_MARKER,
    MAIL_RECORDS_ANCHOR,
};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 16).expect("valid date")
}

fn key_of_len(len: usize) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    (0..len).map(|i| char::from(ALPHABET[i % 64])).collect()
}

const ZONE_WITH_PLACEHOLDER: &str = "\
$TTL 3600
@   IN  SOA ns1.example.org. hostmaster.example.org. (
            2026101502 ; Serial
            3600       ; Refresh
            900        ; Retry
            1209600    ; Expire
            300 )      ; Minimum
@       IN  NS  ns1.example.org.
@       IN  MX  10 mail.example.org.

; DKIM - Domain Keys Identified Mail
; default._domainkey IN TXT \"v=DKIM1; k=rsa; p=PLACEHOLDER\"

; Additional mail-related records
_dmarc  IN  TXT \"v=DMARC1; p=quarantine\"
";

const ZONE_WITHOUT_DKIM: &str = "\
$TTL 3600
@   IN  SOA ns1.example.org. hostmaster.example.org. (
            2026101601 ; serial
            3600 900 1209600 300 )
@       IN  NS  ns1.example.org.
www     IN  A   192.0.2.10
";

// ---------------------------------------------------------------------------
// Section present
// ---------------------------------------------------------------------------

#[test]
fn placeholder_section_is_replaced_and_serial_reset_for_new_day() {
    let key = key_of_len(300);
    let patch = patch_zone(ZONE_WITH_PLACEHOLDER, &key, today()).expect("patch");

    assert_eq!(patch.old_serial, "2026101502");
    assert_eq!(patch.new_serial, "2026101601");
    assert_eq!(patch.edit, DkimEdit::Replaced);
    assert!(patch.text.contains("2026101601 ; Serial"));
    assert!(!patch.text.contains("PLACEHOLDER"));
    assert!(patch.text.ends_with('\n'));

    let zone = ZoneText::parse(&patch.text);
    assert_eq!(zone.dkim_block_count(), 1);
    let fragments = zone.dkim_key_fragments().expect("fragments");
    assert_eq!(fragments.len(), 2);
    assert_eq!(fragments[0].len(), 255);
    assert_eq!(fragments.concat(), key);

    // Surrounding records survive, still after the block.
    let dkim_at = patch.text.find(DKIM_MARKER).expect("marker");
    let anchor_at = patch.text.find(MAIL_RECORDS_ANCHOR).expect("anchor");
    assert!(dkim_at < anchor_at);
    assert!(patch.text.contains("_dmarc  IN  TXT"));
    assert!(patch.text.contains("@       IN  MX  10 mail.example.org."));
}

#[test]
fn second_rotation_replaces_rather_than_duplicates() {
    let first = patch_zone(ZONE_WITH_PLACEHOLDER, &key_of_len(300), today()).expect("first");
    let second_key = key_of_len(400);
    let second = patch_zone(&first.text, &second_key, today()).expect("second");

    assert_eq!(second.old_serial, "2026101601");
    assert_eq!(second.new_serial, "2026101602");
    assert_eq!(second.edit, DkimEdit::Replaced);

    let zone = ZoneText::parse(&second.text);
    assert_eq!(zone.dkim_block_count(), 1);
    assert_eq!(
        zone.dkim_key_fragments().expect("fragments").concat(),
        second_key
    );
    assert_eq!(second.text.matches("default._domainkey").count(), 1);
}

#[test]
fn blank_line_between_marker_and_record_does_not_duplicate() {
    let zone = format!(
        "{ZONE_WITHOUT_DKIM}\n; DKIM - Domain Keys Identified Mail\n\ndefault._domainkey IN TXT \"v=DKIM1; k=rsa; p=OLDKEY\"\n\nftp IN A 192.0.2.11\n"
    );
    let key = key_of_len(300);
    let patch = patch_zone(&zone, &key, today()).expect("patch");

    assert_eq!(patch.edit, DkimEdit::Replaced);
    assert!(!patch.text.contains("OLDKEY"));
    let owners = patch
        .text
        .lines()
        .filter(|l| l.trim_start().starts_with("default._domainkey"))
        .count();
    assert_eq!(owners, 1, "{}", patch.text);
    assert!(patch.text.contains("\n\nftp IN A 192.0.2.11"));
    assert_eq!(extract_public_key(&patch.text).as_deref(), Some(key.as_str()));
}

#[test]
fn bare_record_without_marker_is_replaced() {
    let zone = format!(
        "{ZONE_WITHOUT_DKIM}default._domainkey IN TXT ( \"v=DKIM1; k=rsa; \"\n    \"p=OLDKEY\" )\nftp IN A 192.0.2.11\n"
    );
    let patch = patch_zone(&zone, "NEWKEY", today()).expect("patch");

    assert_eq!(patch.edit, DkimEdit::Replaced);
    assert!(!patch.text.contains("OLDKEY"));
    assert!(patch.text.contains(DKIM_MARKER));
    assert!(patch.text.contains("ftp IN A 192.0.2.11"));
    assert_eq!(extract_public_key(&patch.text).as_deref(), Some("NEWKEY"));
}

// ---------------------------------------------------------------------------
// Section absent
// ---------------------------------------------------------------------------

#[test]
fn missing_section_is_appended_after_existing_records() {
    let key = key_of_len(200);
    let patch = patch_zone(ZONE_WITHOUT_DKIM, &key, today()).expect("patch");

    assert_eq!(patch.edit, DkimEdit::Inserted);
    assert_eq!(patch.new_serial, "2026101602");
    let www_at = patch.text.find("www     IN  A").expect("www record");
    let dkim_at = patch.text.find(DKIM_MARKER).expect("marker");
    assert!(www_at < dkim_at);
    assert!(patch.text.ends_with("    )\n"));
    assert_eq!(
        ZoneText::parse(&patch.text).dkim_key_fragments(),
        Some(vec![key])
    );
}

#[test]
fn missing_section_is_inserted_before_mail_records_comment() {
    let zone = format!("{ZONE_WITHOUT_DKIM}\n{MAIL_RECORDS_ANCHOR}\n_dmarc IN TXT \"v=DMARC1\"\n");
    let patch = patch_zone(&zone, "KEY", today()).expect("patch");

    assert_eq!(patch.edit, DkimEdit::Inserted);
    let dkim_at = patch.text.find(DKIM_MARKER).expect("marker");
    let anchor_at = patch.text.find(MAIL_RECORDS_ANCHOR).expect("anchor");
    assert!(dkim_at < anchor_at);
}

// ---------------------------------------------------------------------------
// Serial errors
// ---------------------------------------------------------------------------

#[test]
fn zone_without_serial_is_rejected_untouched() {
    let err = patch_zone("@ IN NS ns1.example.org.\n", "KEY", today()).unwrap_err();
    assert_eq!(err, ZoneError::SerialNotFound);
}

#[test]
fn only_first_annotated_serial_is_bumped() {
    let text = "2026101601 ; serial\n; 2026101601 ; serial in a comment\n";
    let mut zone = ZoneText::parse(text);
    let (old, new) = zone.bump_serial(today()).expect("bump");
    assert_eq!((old.as_str(), new.as_str()), ("2026101601", "2026101602"));
    assert_eq!(
        zone.render(),
        "2026101602 ; serial\n; 2026101601 ; serial in a comment\n"
    );
}
