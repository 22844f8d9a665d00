// src/api_keys.rs
//
// API key provisioning and display helpers. Keys are three '_'-separated
// parts: a short role prefix, an 8-char base36 millisecond timestamp, and an
// alphanumeric secret. Total length is budgeted, so the secret shrinks to
// absorb the prefix and separators.

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

const TIMESTAMP_LEN: usize = 8;
const SEPARATOR_COUNT: usize = 2;

/// Generate a key of exactly `length` chars: `{prefix}_{timestamp}_{secret}`.
pub fn generate_api_key(prefix: &str, length: usize) -> String {
    let timestamp = timestamp_component();
    let secret_len = length.saturating_sub(TIMESTAMP_LEN + prefix.len() + SEPARATOR_COUNT);
    let secret: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(secret_len)
        .map(char::from)
        .collect();

    format!("{}_{}_{}", prefix, timestamp, secret)
}

/// Publishable key, safe to show in UIs and logs.
pub fn generate_publishable_key() -> String {
    generate_api_key("pk", 32)
}

/// Secret key for privileged calls. Never log one unmasked.
pub fn generate_secret_key() -> String {
    generate_api_key("sk", 40)
}

/// Structural check: known prefix, 8-char lowercase base36 timestamp,
/// non-empty alphanumeric secret.
pub fn validate_api_key(key: &str) -> bool {
    let mut parts = key.split('_');
    let (Some(prefix), Some(timestamp), Some(secret), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    matches!(prefix, "tm" | "pk" | "sk")
        && timestamp.len() == TIMESTAMP_LEN
        && timestamp
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        && !secret.is_empty()
        && secret.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Display form of a key. With `mask` set, the middle of the secret is
/// replaced by bullets so the key can appear in logs. Anything that does not
/// split into the three expected parts comes back unchanged.
pub fn format_api_key(key: &str, mask: bool) -> String {
    if key.is_empty() {
        return String::new();
    }

    let parts: Vec<&str> = key.split('_').collect();
    if parts.len() != 3 || !mask {
        return key.to_string();
    }

    let secret: Vec<char> = parts[2].chars().collect();
    let bullets = 6.min(secret.len().saturating_sub(8));
    let head: String = secret.iter().take(4).collect();
    let tail: String = secret[secret.len().saturating_sub(4)..].iter().collect();

    format!(
        "{}_{}_{}{}{}",
        parts[0],
        parts[1],
        head,
        "•".repeat(bullets),
        tail
    )
}

/// Last 8 base36 digits of the current millisecond clock, zero-padded.
fn timestamp_component() -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    let encoded = to_base36(millis);
    if encoded.len() > TIMESTAMP_LEN {
        encoded[encoded.len() - TIMESTAMP_LEN..].to_string()
    } else {
        format!("{:0>width$}", encoded, width = TIMESTAMP_LEN)
    }
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.iter().rev().map(|&b| b as char).collect()
}
