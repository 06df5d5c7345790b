//! Content-derived version tags for cache generations.

use sha2::{Digest, Sha256};

/// Number of hex characters kept from the digest.
const TAG_HEX_LEN: usize = 12;

/// Derive a generation version tag from a release string and the app shell manifest.
///
/// Any change to the release or to the manifest list yields a new tag, so a
/// deploy that forgets to bump an explicit version still rotates generations.
pub fn derive_version_tag(release: &str, manifest: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(release.as_bytes());
    for path in manifest {
        hasher.update(b"\n");
        hasher.update(path.as_bytes());
    }
    let digest = hex::encode(hasher.finalize());
    format!("m{}", &digest[..TAG_HEX_LEN])
}
