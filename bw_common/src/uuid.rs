//! UUID generation/parsing (§3, §4.12). Thin wrapper over the `uuid` crate:
//! version/variant nibbles are set the same way vanilla does, and v3 hashes
//! the raw input bytes directly (no RFC 4122 namespace concatenation) to
//! match the offline-player UUID scheme this protocol expects.

pub use ::uuid::Uuid;

/// Generates a random (v4) UUID: 16 random bytes with the version nibble set
/// to 4 and the variant nibble set to the RFC 4122 variant (`10xx`).
pub fn generate_v4() -> Uuid { Uuid::new_v4() }

/// Generates a name-based (v3) UUID: MD5 of `name`'s bytes, with the version
/// nibble set to 3 and the variant nibble set to the RFC 4122 variant.
pub fn generate_v3(name: &str) -> Uuid {
  let digest = ::md5::compute(name.as_bytes());
  let mut bytes: [u8; 16] = digest.0;
  bytes[6] = (bytes[6] & 0x0f) | 0x30;
  bytes[8] = (bytes[8] & 0x3f) | 0x80;
  Uuid::from_bytes(bytes)
}

/// Formats as 32 lowercase hex digits with dashes at positions 8, 12, 16, 20.
pub fn format_dashed(u: Uuid) -> String { u.hyphenated().to_string() }

/// Accepts 32 contiguous hex digits (case-insensitive), ignoring dashes.
pub fn parse(s: &str) -> Option<Uuid> {
  let stripped: String = s.chars().filter(|c| *c != '-').collect();
  if stripped.len() != 32 || !stripped.chars().all(|c| c.is_ascii_hexdigit()) {
    return None;
  }
  let n = u128::from_str_radix(&stripped, 16).ok()?;
  Some(Uuid::from_u128(n))
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn v3_is_deterministic_and_versioned() {
    let a = generate_v3("Alice");
    let b = generate_v3("Alice");
    assert_eq!(a, b);
    assert_eq!(a.get_version_num(), 3);
    let c = generate_v3("Bob");
    assert_ne!(a, c);
  }

  #[test]
  fn v4_is_versioned_and_random() {
    let a = generate_v4();
    let b = generate_v4();
    assert_eq!(a.get_version_num(), 4);
    assert_ne!(a, b);
  }

  #[test]
  fn format_parse_roundtrip() {
    let u = generate_v4();
    let formatted = format_dashed(u);
    assert_eq!(formatted.len(), 36);
    assert_eq!(parse(&formatted), Some(u));
  }

  #[test]
  fn parse_accepts_undashed_and_mixed_case() {
    let u = generate_v4();
    let undashed = u.simple().to_string();
    assert_eq!(parse(&undashed), Some(u));
    assert_eq!(parse(&undashed.to_uppercase()), Some(u));
  }

  #[test]
  fn parse_rejects_wrong_length() {
    assert_eq!(parse("abcd"), None);
  }
}
