//! Parsing of `gpg --list-packets` output.

use std::collections::HashMap;

use tracing::trace;

/// Line prefix of a public-key encrypted session key packet.
pub const PUBKEY_ENC_PACKET: &str = ":pubkey enc packet:";

/// Splits one packet-dump line into its named fields.
///
/// The line has the shape `<tag>: <tokens>`, where gpg itself writes the
/// tag as `:tag:`. Tokens of the form `name=value` become entries. A
/// comma-separated segment of exactly two bare words, as gpg prints
/// `keyid 0123456789ABCDEF`, is read as a name and value. Everything else
/// is ignored; malformed lines give an empty or partial map.
pub fn split_packet(line: &str) -> HashMap<&str, &str> {
    let mut fields = HashMap::new();

    let line = line.trim();
    let line = line.strip_prefix(':').unwrap_or(line);
    let Some((_tag, body)) = line.split_once(':') else {
        return fields;
    };

    for segment in body.split(',') {
        let words: Vec<&str> = segment.split_whitespace().collect();
        let mut assigned = false;
        for word in &words {
            if let Some((name, value)) = word.split_once('=') {
                if !name.is_empty() {
                    fields.insert(name, value);
                }
                assigned = true;
            }
        }
        if !assigned && let [name, value] = words.as_slice() {
            fields.insert(*name, *value);
        }
    }

    fields
}

/// Collects the recipient key IDs from a packet dump of an encrypted
/// message, in the order gpg printed them. Duplicates are kept.
pub fn parse_recipients(output: &str) -> Vec<String> {
    let mut recipients = Vec::new();

    for line in output.lines() {
        let line = line.trim();
        trace!(line, "gpg packet output");
        if !line.starts_with(PUBKEY_ENC_PACKET) {
            continue;
        }
        if let Some(keyid) = split_packet(line).get("keyid") {
            recipients.push((*keyid).to_string());
        }
    }

    recipients
}
