//! Example: List all public and secret keys in the default GnuPG keyring
//!
//! Run with: cargo run --example list_keys

use chrono::Utc;
use gpg_cli::{Config, Gpg, Key, Validity};

#[tokio::main]
async fn main() -> gpg_cli::Result<()> {
    let gpg = Gpg::new(Config::default());
    let public = gpg.list_public_keys().await?;
    let secret = gpg.list_secret_keys().await?;

    println!(
        "Found {} public and {} secret keys using {}\n",
        public.len(),
        secret.len(),
        gpg.binary().display()
    );

    for key in public.iter() {
        let has_secret = secret.find_key(&key.fingerprint).is_some();
        println!("{}", format_key_output(key, has_secret));
    }

    Ok(())
}

fn format_key_output(key: &Key, has_secret: bool) -> String {
    let validity_marker = match key.validity {
        Validity::Ultimate => "[U]",
        Validity::Full => "[F]",
        Validity::Marginal => "[M]",
        Validity::Never => "[N]",
        Validity::Unknown => "[-]",
        Validity::Expired => "[E]",
        Validity::Revoked => "[R]",
        _ => "[?]",
    };

    let expires = key
        .expires
        .map(|d| format!(" expires {}", d.date_naive()))
        .unwrap_or_default();
    let secret_marker = if has_secret { " (secret)" } else { "" };
    let usable = if key.is_useable(Utc::now()) { "" } else { " unusable" };

    let mut out = format!(
        "{} {} {}{}{}{}",
        validity_marker, key.fingerprint, key, secret_marker, usable, expires
    );
    for identity in key.identities.iter().skip(1) {
        out.push_str(&format!("\n    aka {}", identity.id()));
    }
    for sub in &key.subkeys {
        out.push_str(&format!("\n    sub {}{} {}", sub.algorithm, sub.length, sub.id()));
    }
    out
}
