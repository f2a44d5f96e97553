use crate::layout::FINGERPRINT_SIZE;
use md5::{Digest, Md5};

/// A 16-byte name fingerprint, the MD5 digest of the name's UTF-8 bytes.
///
/// Fingerprints identify objects by name both in the segment namespace
/// region and in the store's name map. The name itself is never stored.
pub type Fingerprint = [u8; FINGERPRINT_SIZE];

/// Fingerprint a name.
pub fn fingerprint(name: &str) -> Fingerprint {
    Md5::digest(name.as_bytes()).into()
}

/// Render a fingerprint as lowercase hex, for log messages.
pub fn to_hex(fp: &Fingerprint) -> String {
    hex::encode(fp)
}
