//! Parser for `gpg --with-colons` key listings.
//!
//! Each line is first classified into a [`Record`] by [`tokenize`], which
//! never fails: unrecognised or unusable lines yield `None` and are logged
//! at debug level. [`parse_colons`] then folds the records into a
//! [`KeyList`].

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use tracing::debug;

use crate::types::{Algorithm, Capabilities, Identity, Key, KeyKind, KeyList, Validity};

static UID_WITH_COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([^(<]+)\s+\(([^)]+)\)\s+<([^>]+)>").expect("UID pattern is valid")
});
static UID_PLAIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^(<]+)\s+<([^>]+)>").expect("UID pattern is valid"));

/// A classified colon record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Record {
    /// `pub` or `sec`
    Primary(Key),
    /// `sub` or `ssb`
    Subkey(Key),
    Fingerprint(String),
    Identity(Identity),
}

pub(crate) fn tokenize(line: &str, kind: KeyKind) -> Option<Record> {
    let fields: Vec<&str> = line.split(':').collect();

    match fields[0] {
        "pub" | "sec" => Some(Record::Primary(key_from_fields(&fields, kind))),
        "sub" | "ssb" => Some(Record::Subkey(key_from_fields(&fields, kind))),
        "fpr" => match field(&fields, 9) {
            "" => {
                debug!("skipping fpr record without fingerprint");
                None
            }
            fpr => Some(Record::Fingerprint(fpr.to_string())),
        },
        "uid" if fields.len() > 9 => Some(Record::Identity(identity_from_fields(&fields))),
        "uid" => {
            debug!("skipping truncated uid record");
            None
        }
        "" => None,
        other => {
            debug!(record_type = other, "skipping unhandled GPG record type");
            None
        }
    }
}

/// Builds a key list from the output of `--list-public-keys` or
/// `--list-secret-keys` with `--with-colons --with-fingerprint`.
///
/// `kind` is taken from the listing that was requested; `pub` and `sec`
/// are both accepted as primary records. Malformed lines are skipped and
/// the rest of the stream is still parsed.
pub fn parse_colons(output: &str, kind: KeyKind) -> KeyList {
    let mut keys = KeyList::default();
    let mut current: Option<Key> = None;

    for line in output.lines() {
        let Some(record) = tokenize(line, kind) else {
            continue;
        };

        match record {
            Record::Primary(key) => {
                if let Some(done) = current.replace(key) {
                    finish(&mut keys, done);
                }
            }
            Record::Subkey(sub) => match current.as_mut() {
                Some(primary) => primary.subkeys.push(sub),
                None => debug!(key_id = %sub.key_id, "dropping sub-key record without primary key"),
            },
            Record::Fingerprint(fpr) => {
                let Some(primary) = current.as_mut() else {
                    debug!("dropping fpr record without open key");
                    continue;
                };
                // fpr belongs to the record opened last
                let open = match primary.subkeys.len() {
                    0 => primary,
                    n => &mut primary.subkeys[n - 1],
                };
                if open.fingerprint.is_empty() {
                    open.fingerprint = fpr;
                }
            }
            Record::Identity(identity) => match current.as_mut() {
                Some(primary) => primary.identities.push(identity),
                None => debug!("dropping uid record without primary key"),
            },
        }
    }

    if let Some(done) = current {
        finish(&mut keys, done);
    }

    keys
}

fn finish(keys: &mut KeyList, key: Key) {
    if key.fingerprint.is_empty() {
        debug!(key_id = %key.key_id, "skipping key: missing fingerprint");
        return;
    }
    let fingerprint = key.fingerprint.clone();
    if !keys.insert(key) {
        debug!(%fingerprint, "skipping duplicate key");
    }
}

fn field<'a>(fields: &[&'a str], index: usize) -> &'a str {
    fields.get(index).copied().unwrap_or_default()
}

fn key_from_fields(fields: &[&str], kind: KeyKind) -> Key {
    Key {
        kind,
        validity: Validity::from_field(field(fields, 1)),
        length: field(fields, 2).parse().unwrap_or(0),
        algorithm: Algorithm::from_code(field(fields, 3)),
        key_id: field(fields, 4).to_string(),
        created: parse_timestamp(field(fields, 5)),
        expires: parse_timestamp(field(fields, 6)),
        ownertrust: Validity::from_field(field(fields, 8)),
        capabilities: Capabilities::from_field(field(fields, 11)),
        ..Key::default()
    }
}

fn identity_from_fields(fields: &[&str]) -> Identity {
    let uid = unescape(field(fields, 9));
    let (name, comment, email) = parse_uid(&uid);
    Identity {
        name,
        comment,
        email,
        validity: Validity::from_field(field(fields, 1)),
        created: parse_timestamp(field(fields, 5)),
    }
}

/// Splits a user ID into name, comment and e-mail.
///
/// Tries `name (comment) <email>`, then `name <email>`. Anything else
/// becomes the name with empty comment and e-mail.
pub(crate) fn parse_uid(uid: &str) -> (String, String, String) {
    if let Some(caps) = UID_WITH_COMMENT.captures(uid) {
        return (
            caps[1].trim().to_string(),
            caps[2].trim().to_string(),
            caps[3].trim().to_string(),
        );
    }
    if let Some(caps) = UID_PLAIN.captures(uid) {
        return (
            caps[1].trim().to_string(),
            String::new(),
            caps[2].trim().to_string(),
        );
    }
    (uid.to_string(), String::new(), String::new())
}

/// Decodes the `\xHH` escapes gpg uses for colons and control characters.
fn unescape(raw: &str) -> String {
    if !raw.contains("\\x") {
        return raw.to_string();
    }

    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && bytes.get(i + 1) == Some(&b'x') {
            let decoded = raw
                .get(i + 2..i + 4)
                .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(byte) = decoded {
                out.push(byte);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Parses epoch seconds or the ISO form gpg emits with `--fixed-list-mode`
/// on some versions.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    if let Ok(secs) = s.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0);
    }
    NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S")
        .ok()
        .map(|dt| dt.and_utc())
}
