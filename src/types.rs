use std::fmt;

use chrono::{DateTime, Utc};

use crate::validation::normalize_keyid;

/// Which listing produced a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyKind {
    #[default]
    Public,
    Secret,
}

impl KeyKind {
    pub(crate) fn listing_flag(self) -> &'static str {
        match self {
            Self::Public => "--list-public-keys",
            Self::Secret => "--list-secret-keys",
        }
    }
}

/// Public key algorithm, keyed by the OpenPGP algorithm number gpg reports
/// in field 4 of a key record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum Algorithm {
    Rsa,
    Elgamal,
    Dsa,
    Ecdh,
    Ecdsa,
    EdDsa,
    X25519,
    Ed25519,
    #[default]
    Unknown,
}

impl Algorithm {
    pub fn from_code(code: &str) -> Self {
        match code {
            "1" | "2" | "3" => Self::Rsa,
            "16" | "20" => Self::Elgamal,
            "17" => Self::Dsa,
            "18" => Self::Ecdh,
            "19" => Self::Ecdsa,
            "22" => Self::EdDsa,
            "25" => Self::X25519,
            "27" => Self::Ed25519,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Rsa => "RSA",
            Self::Elgamal => "Elgamal",
            Self::Dsa => "DSA",
            Self::Ecdh => "ECDH",
            Self::Ecdsa => "ECDSA",
            Self::EdDsa => "EdDSA",
            Self::X25519 => "X25519",
            Self::Ed25519 => "Ed25519",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Validity of a key or user ID.
///
/// Computed by gpg from signatures and the web of trust. The same letter
/// table is used for owner trust, which gpg reports in a separate field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum Validity {
    /// Not yet computed or not reported (`o`, `q`, `-` or empty).
    #[default]
    Unknown,
    /// Invalid, e.g. missing self-signature (`i`).
    Invalid,
    /// Disabled by the user (`d`).
    Disabled,
    /// Revoked (`r`).
    Revoked,
    /// Expired (`e`).
    Expired,
    /// Explicitly not valid (`n`).
    Never,
    /// Marginally valid (`m`).
    Marginal,
    /// Fully valid (`f`).
    Full,
    /// Ultimately valid, usually the user's own key (`u`).
    Ultimate,
    /// Well known private part (`w`).
    WellKnownPrivate,
}

impl Validity {
    pub fn from_gpg_char(c: char) -> Self {
        match c {
            'i' => Self::Invalid,
            'd' => Self::Disabled,
            'r' => Self::Revoked,
            'e' => Self::Expired,
            'n' => Self::Never,
            'm' => Self::Marginal,
            'f' => Self::Full,
            'u' => Self::Ultimate,
            'w' => Self::WellKnownPrivate,
            _ => Self::Unknown,
        }
    }

    pub(crate) fn from_field(field: &str) -> Self {
        field
            .chars()
            .next()
            .map(Self::from_gpg_char)
            .unwrap_or_default()
    }

    /// Whether gpg would refuse to use a key with this validity.
    pub fn is_unusable(self) -> bool {
        matches!(
            self,
            Self::Invalid | Self::Disabled | Self::Revoked | Self::Expired
        )
    }
}

/// Key capabilities from field 12 of a key record.
///
/// gpg reports the capabilities of the key itself in lower case and, on
/// primary keys, the aggregate of all usable sub-keys in upper case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Capabilities {
    pub encrypt: bool,
    pub sign: bool,
    pub certify: bool,
    pub authenticate: bool,
    pub usable_encrypt: bool,
    pub usable_sign: bool,
}

impl Capabilities {
    pub fn from_field(field: &str) -> Self {
        let mut caps = Self::default();
        for c in field.chars() {
            match c {
                'e' => caps.encrypt = true,
                's' => caps.sign = true,
                'c' => caps.certify = true,
                'a' => caps.authenticate = true,
                'E' => caps.usable_encrypt = true,
                'S' => caps.usable_sign = true,
                _ => {}
            }
        }
        caps
    }
}

/// A user ID bound to a key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Identity {
    pub name: String,
    pub comment: String,
    pub email: String,
    pub validity: Validity,
    pub created: Option<DateTime<Utc>>,
}

impl Identity {
    /// The user ID in canonical `Name (Comment) <email>` form.
    pub fn id(&self) -> String {
        let mut out = self.name.clone();
        if !self.comment.is_empty() {
            out.push_str(&format!(" ({})", self.comment));
        }
        if !self.email.is_empty() {
            out.push_str(&format!(" <{}>", self.email));
        }
        out
    }
}

/// An OpenPGP key as reported by a gpg key listing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Key {
    pub kind: KeyKind,
    pub length: u32,
    pub algorithm: Algorithm,
    pub fingerprint: String,
    pub key_id: String,
    pub created: Option<DateTime<Utc>>,
    pub expires: Option<DateTime<Utc>>,
    pub validity: Validity,
    pub ownertrust: Validity,
    pub capabilities: Capabilities,
    pub identities: Vec<Identity>,
    pub subkeys: Vec<Key>,
}

impl Key {
    /// Long key ID, falling back to the fingerprint tail when gpg did not
    /// report one.
    pub fn id(&self) -> &str {
        if !self.key_id.is_empty() {
            return &self.key_id;
        }
        let start = self.fingerprint.len().saturating_sub(16);
        self.fingerprint.get(start..).unwrap_or(&self.fingerprint)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|at| at <= now)
    }

    /// Whether the key can be used at `now`: not revoked, disabled, invalid
    /// or expired.
    pub fn is_useable(&self, now: DateTime<Utc>) -> bool {
        !self.validity.is_unusable() && !self.is_expired(now)
    }

    /// Whether this key or one of its sub-keys can encrypt.
    pub fn can_encrypt(&self) -> bool {
        self.capabilities.usable_encrypt
            || self.capabilities.encrypt
            || self.subkeys.iter().any(|sub| sub.capabilities.encrypt)
    }

    fn matches(&self, needle: &str) -> bool {
        let fingerprint = self.fingerprint.to_uppercase();
        let key_id = self.key_id.to_uppercase();
        (!fingerprint.is_empty() && fingerprint.ends_with(needle))
            || (!key_id.is_empty() && key_id.ends_with(needle))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{} {}{}", self.id(), self.algorithm, self.length)?;
        if let Some(identity) = self.identities.first() {
            write!(f, " - {}", identity.id())?;
        }
        Ok(())
    }
}

/// Top-level keys of one listing, in listing order.
///
/// Fingerprints are unique within a list; sub-keys live inside their
/// parent and never appear here.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyList {
    keys: Vec<Key>,
}

impl KeyList {
    /// Appends a key unless its fingerprint is already present.
    pub(crate) fn insert(&mut self, key: Key) -> bool {
        if self.keys.iter().any(|k| k.fingerprint == key.fingerprint) {
            return false;
        }
        self.keys.push(key);
        true
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Key> {
        self.keys.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Key> {
        self.keys.get(index)
    }

    /// Finds the key whose fingerprint or key ID, or that of one of its
    /// sub-keys, ends with `id`. Case and a `0x` prefix are ignored.
    pub fn find_key(&self, id: &str) -> Option<&Key> {
        let needle = normalize_keyid(id);
        if needle.is_empty() {
            return None;
        }
        self.keys
            .iter()
            .find(|k| k.matches(&needle) || k.subkeys.iter().any(|s| s.matches(&needle)))
    }

    /// Keys usable at `now`.
    pub fn useable_keys(&self, now: DateTime<Utc>) -> impl Iterator<Item = &Key> {
        self.keys.iter().filter(move |k| k.is_useable(now))
    }

    /// Fingerprints of all keys usable at `now`, suitable for `--recipient`.
    pub fn recipients(&self, now: DateTime<Utc>) -> Vec<String> {
        self.useable_keys(now)
            .map(|k| k.fingerprint.clone())
            .collect()
    }
}

impl std::ops::Index<usize> for KeyList {
    type Output = Key;

    fn index(&self, index: usize) -> &Key {
        &self.keys[index]
    }
}

impl IntoIterator for KeyList {
    type Item = Key;
    type IntoIter = std::vec::IntoIter<Key>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys.into_iter()
    }
}

impl<'a> IntoIterator for &'a KeyList {
    type Item = &'a Key;
    type IntoIter = std::slice::Iter<'a, Key>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn key(fingerprint: &str) -> Key {
        Key {
            fingerprint: fingerprint.to_string(),
            key_id: fingerprint[fingerprint.len() - 16..].to_string(),
            ..Key::default()
        }
    }

    #[test]
    fn test_validity_from_gpg_char() {
        assert_eq!(Validity::from_gpg_char('o'), Validity::Unknown);
        assert_eq!(Validity::from_gpg_char('q'), Validity::Unknown);
        assert_eq!(Validity::from_gpg_char('-'), Validity::Unknown);
        assert_eq!(Validity::from_gpg_char('i'), Validity::Invalid);
        assert_eq!(Validity::from_gpg_char('d'), Validity::Disabled);
        assert_eq!(Validity::from_gpg_char('r'), Validity::Revoked);
        assert_eq!(Validity::from_gpg_char('e'), Validity::Expired);
        assert_eq!(Validity::from_gpg_char('n'), Validity::Never);
        assert_eq!(Validity::from_gpg_char('m'), Validity::Marginal);
        assert_eq!(Validity::from_gpg_char('f'), Validity::Full);
        assert_eq!(Validity::from_gpg_char('u'), Validity::Ultimate);
        assert_eq!(Validity::from_gpg_char('w'), Validity::WellKnownPrivate);
        assert_eq!(Validity::from_gpg_char('x'), Validity::Unknown);
    }

    #[test]
    fn test_validity_from_empty_field() {
        assert_eq!(Validity::from_field(""), Validity::Unknown);
    }

    #[test]
    fn test_algorithm_from_code() {
        assert_eq!(Algorithm::from_code("1"), Algorithm::Rsa);
        assert_eq!(Algorithm::from_code("17"), Algorithm::Dsa);
        assert_eq!(Algorithm::from_code("18"), Algorithm::Ecdh);
        assert_eq!(Algorithm::from_code("22"), Algorithm::EdDsa);
        assert_eq!(Algorithm::from_code("99"), Algorithm::Unknown);
        assert_eq!(Algorithm::from_code(""), Algorithm::Unknown);
    }

    #[test]
    fn test_capabilities_from_field() {
        let caps = Capabilities::from_field("scESC");
        assert!(caps.sign);
        assert!(caps.certify);
        assert!(caps.usable_encrypt);
        assert!(caps.usable_sign);
        assert!(!caps.encrypt);
        assert!(!caps.authenticate);
    }

    #[test]
    fn test_identity_id() {
        let full = Identity {
            name: "Jane Doe".into(),
            comment: "work".into(),
            email: "jane@example.com".into(),
            ..Identity::default()
        };
        assert_eq!(full.id(), "Jane Doe (work) <jane@example.com>");

        let bare = Identity {
            name: "garbled".into(),
            ..Identity::default()
        };
        assert_eq!(bare.id(), "garbled");
    }

    #[test]
    fn test_key_id_falls_back_to_fingerprint() {
        let k = Key {
            fingerprint: "6645B0A8C7005E78DB1D7864F99FFE0FEAE999BD".into(),
            ..Key::default()
        };
        assert_eq!(k.id(), "F99FFE0FEAE999BD");
    }

    #[test]
    fn test_key_list_rejects_duplicate_fingerprint() {
        let mut list = KeyList::default();
        assert!(list.insert(key("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA")));
        assert!(!list.insert(key("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA")));
        assert!(list.insert(key("BBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB")));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_find_key_by_suffix_and_subkey() {
        let mut primary = key("6645B0A8C7005E78DB1D7864F99FFE0FEAE999BD");
        primary
            .subkeys
            .push(key("BAE40BD8DC8BDAAA11DCFF68B31FB30B04D73EB0"));
        let mut list = KeyList::default();
        list.insert(primary);

        assert!(list.find_key("0xfeae999bd").is_some());
        assert!(list.find_key("F99FFE0FEAE999BD").is_some());
        assert!(list.find_key("B31FB30B04D73EB0").is_some());
        assert!(list.find_key("DEADBEEF").is_none());
        assert!(list.find_key("").is_none());
    }

    #[test]
    fn test_useable_keys_skip_expired_and_revoked() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut expired = key("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA");
        expired.expires = Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
        let mut revoked = key("BBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB");
        revoked.validity = Validity::Revoked;
        let mut good = key("CCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCC");
        good.validity = Validity::Full;

        let mut list = KeyList::default();
        list.insert(expired);
        list.insert(revoked);
        list.insert(good);

        assert_eq!(
            list.recipients(now),
            vec!["CCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCC".to_string()]
        );
    }

    #[test]
    fn test_key_display() {
        let k = Key {
            fingerprint: "6645B0A8C7005E78DB1D7864F99FFE0FEAE999BD".into(),
            key_id: "F99FFE0FEAE999BD".into(),
            algorithm: Algorithm::Rsa,
            length: 4096,
            identities: vec![Identity {
                name: "Jane Doe".into(),
                email: "jane@example.com".into(),
                ..Identity::default()
            }],
            ..Key::default()
        };
        assert_eq!(
            k.to_string(),
            "0xF99FFE0FEAE999BD RSA4096 - Jane Doe <jane@example.com>"
        );
    }
}
