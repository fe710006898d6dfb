//! Protocol version negotiation: the version -> handshake-token table and
//! the small process-wide cache of "host -> last known working version"
//! that lets a client skip straight to the right version on reconnect.

use lazy_static::lazy_static;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Mutex;

/// Protocol 23056 is a development snapshot that negotiates exactly like 56.
pub const LEGACY_DEV_VERSION: u32 = 23056;
pub const LEGACY_DEV_VERSION_ALIAS: u32 = 56;

/// The newest protocol version this client knows how to speak.
pub const CURRENT_VERSION: u32 = 77;

/// Versions below this do not send (or expect) a handshake token at all.
const TOKEN_MIN_VERSION: u32 = 62;

/// version -> token, taken from the backend's `protomap[]`.
fn token_for_version(version: u32) -> Option<&'static str> {
    match version {
        62 => Some("0C0FFEE0"),
        63 => Some("0G0G0G0"),
        64 => Some("XXXXTEST"),
        65 => Some("65D7CEA8"),
        66 => Some("0C0FFEE0"),
        67 => Some("0G0G0G0"),
        68 => Some("XXXTEST9"),
        69 => Some("D2BB6F01"),
        70 => Some("DEADBEEF"),
        71 => Some("GAMMARAY"),
        72 => Some("BENNY"),
        73 => Some("LEGACYXK"),
        74 => Some("SingingPotato"),
        75 => Some("SweetRock"),
        76 => Some("UglyDucklings"),
        77 => Some("WindMark"),
        _ => None,
    }
}

/// Resolve the handshake token to send for `version`, if one is required.
///
/// `version` should already have [`normalize`] applied.
pub fn handshake_token(version: u32) -> Option<&'static str> {
    if version < TOKEN_MIN_VERSION {
        return None;
    }
    token_for_version(version)
}

/// Fold the `23056` development snapshot down to the version it behaves as.
pub fn normalize(version: u32) -> u32 {
    if version == LEGACY_DEV_VERSION {
        LEGACY_DEV_VERSION_ALIAS
    } else {
        version
    }
}

/// Bounded cache of `host -> last successfully negotiated protocol version`.
///
/// Matches the C client's fixed 8-entry table: once full, a new host
/// evicts a random existing entry rather than the oldest one.
pub struct VersionCache {
    entries: Mutex<Vec<(String, u32)>>,
    capacity: usize,
}

impl VersionCache {
    pub fn new(capacity: usize) -> VersionCache {
        VersionCache {
            entries: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn get(&self, host: &str) -> Option<u32> {
        let entries = self.entries.lock().unwrap();
        entries.iter().find(|(h, _)| h == host).map(|(_, v)| *v)
    }

    pub fn set(&self, host: &str, version: u32) {
        let mut entries = self.entries.lock().unwrap();

        if let Some(slot) = entries.iter_mut().find(|(h, _)| h == host) {
            slot.1 = version;
            return;
        }

        if entries.len() < self.capacity {
            entries.push((host.to_string(), version));
        } else {
            let index = rand::thread_rng().gen_range(0, self.capacity);
            entries[index] = (host.to_string(), version);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

lazy_static! {
    /// The process-wide version cache shared by every `Connection`.
    pub static ref VERSION_CACHE: VersionCache = VersionCache::new(8);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_legacy_dev_snapshot() {
        assert_eq!(normalize(23056), 56);
        assert_eq!(normalize(77), 77);
    }

    #[test]
    fn test_handshake_token_below_min_version_is_none() {
        assert_eq!(handshake_token(40), None);
    }

    #[test]
    fn test_handshake_token_known_version() {
        assert_eq!(handshake_token(77), Some("WindMark"));
        assert_eq!(handshake_token(74), Some("SingingPotato"));
    }

    #[test]
    fn test_cache_is_bounded_at_capacity() {
        let cache = VersionCache::new(8);

        for i in 0..16 {
            cache.set(&format!("host-{}", i), 77);
        }

        assert_eq!(cache.len(), 8);
    }

    #[test]
    fn test_cache_updates_existing_host_in_place() {
        let cache = VersionCache::new(8);
        cache.set("backend", 70);
        cache.set("backend", 77);

        assert_eq!(cache.get("backend"), Some(77));
        assert_eq!(cache.len(), 1);
    }
}
