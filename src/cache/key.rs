//! Cache key derivation.

use sha2::{Digest, Sha256};

/// Derives the store key for a request.
///
/// The method is upper-cased and query parameters are sorted so that
/// logically identical requests share an entry. When `subject` is given it is
/// folded into the digest, keeping one user's responses away from another's.
///
/// Every part enters the digest behind its byte length, so no combination of
/// parts can reproduce the input of another.
pub fn cache_key(method: &str, path: &str, query: Option<&str>, subject: Option<&str>) -> String {
    let mut params: Vec<&str> = query
        .unwrap_or_default()
        .split('&')
        .filter(|p| !p.is_empty())
        .collect();
    params.sort_unstable();

    let method = method.to_ascii_uppercase();
    let query = params.join("&");

    let mut hasher = Sha256::new();
    for part in [method.as_str(), path, query.as_str()] {
        absorb(&mut hasher, part);
    }
    match subject {
        Some(subject) => {
            hasher.update([1u8]);
            absorb(&mut hasher, subject);
        }
        None => hasher.update([0u8]),
    }

    format!("cache:{}", hex::encode(hasher.finalize()))
}

fn absorb(hasher: &mut Sha256, part: &str) {
    hasher.update((part.len() as u64).to_be_bytes());
    hasher.update(part.as_bytes());
}
