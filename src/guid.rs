//! Deterministic GUID generation
//!
//! Component GUIDs are derived from the project GUID so that rebuilding the
//! same project yields the same GUIDs. The byte arithmetic operates on the
//! mixed-endian layout Windows uses for `GUID` structures (see
//! [`Uuid::to_bytes_le`]), which keeps the generated values stable across
//! toolchains that use the same convention.
//!
//! # Example
//!
//! ```
//! use uuid::Uuid;
//! use wix_dsl::guid::{get_hash_code32, hash_guid_by_integer};
//!
//! let start = Uuid::parse_str("6fe30b47-2577-43ad-9095-1861ba25889b").unwrap();
//! let guid = hash_guid_by_integer(start, 1);
//! assert_eq!(guid.to_string(), "6fe30b47-2577-43ad-9095-1861ba25889c");
//! assert_eq!(get_hash_code32("abc"), 536991770);
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Byte positions in `to_bytes_le` order, least significant first.
const ORDER_MAP: [usize; 16] = [15, 14, 13, 12, 11, 10, 9, 8, 6, 7, 4, 5, 0, 1, 2, 3];

/// GUID format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuidFormat {
    /// xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx
    #[default]
    Hyphens,
    /// {xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx}
    Braces,
    /// xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx
    Plain,
    /// {XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX}
    Registry,
}

impl GuidFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuidFormat::Hyphens => "hyphens",
            GuidFormat::Braces => "braces",
            GuidFormat::Plain => "plain",
            GuidFormat::Registry => "registry",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "hyphens" | "h" | "d" => Some(GuidFormat::Hyphens),
            "braces" | "b" => Some(GuidFormat::Braces),
            "plain" | "p" | "n" => Some(GuidFormat::Plain),
            "registry" | "reg" | "r" => Some(GuidFormat::Registry),
            _ => None,
        }
    }

    /// Render `guid` in this format
    pub fn format(&self, guid: &Uuid) -> String {
        match self {
            GuidFormat::Hyphens => guid.hyphenated().to_string(),
            GuidFormat::Braces => guid.braced().to_string(),
            GuidFormat::Plain => guid.simple().to_string(),
            GuidFormat::Registry => guid.braced().to_string().to_uppercase(),
        }
    }
}

/// Stable 32-bit string hash.
///
/// Unlike `std::hash`, the result does not change between runs or platforms,
/// which is what makes hashed ids and component GUIDs reproducible.
pub fn get_hash_code32(s: &str) -> i32 {
    let chars: Vec<i32> = s.encode_utf16().map(i32::from).collect();
    let len = chars.len();

    let mut num1: i32 = 0x1505_1505;
    let mut num2: i32 = num1;
    let mut ind = 0;

    while ind < len {
        let ch = chars[ind];
        ind += 1;
        let next = chars.get(ind).copied().unwrap_or(0);
        num1 = mix(num1) ^ ((next << 16) | ch);

        ind += 1;
        if ind >= len {
            break;
        }

        let ch = chars[ind];
        ind += 1;
        let next = match chars.get(ind) {
            Some(&c) => {
                ind += 1;
                c
            }
            None => 0,
        };
        num2 = mix(num2) ^ ((next << 16) | ch);
    }

    num1.wrapping_add(num2.wrapping_mul(0x5d58_8b65))
}

fn mix(num: i32) -> i32 {
    (num << 5).wrapping_add(num).wrapping_add(num >> 27)
}

/// Offset `guid` by `hash_value`, adding its little-endian bytes to the
/// least significant GUID bytes.
pub fn hash_guid_by_integer(guid: Uuid, hash_value: i32) -> Uuid {
    let mut bytes = guid.to_bytes_le();
    for (i, b) in hash_value.to_le_bytes().iter().enumerate() {
        let index = ORDER_MAP[i];
        bytes[index] = bytes[index].wrapping_add(*b);
    }
    Uuid::from_bytes_le(bytes)
}

/// Hash of a dotted version string with `major.minor[.build[.revision]]`
/// packing; absent components count as -1.
pub fn version_hash(version: &str) -> Option<i32> {
    let parts = parse_version(version)?;
    let mut accumulator: i32 = 0;
    accumulator |= (parts[0] & 0x0000_000F) << 28;
    accumulator |= (parts[1] & 0x0000_00FF) << 20;
    accumulator |= (parts[2] & 0x0000_00FF) << 12;
    accumulator |= parts[3] & 0x0000_0FFF;
    Some(accumulator)
}

/// Parse `major.minor[.build[.revision]]`. Missing parts are -1.
pub fn parse_version(version: &str) -> Option<[i32; 4]> {
    let tokens: Vec<&str> = version.trim().split('.').collect();
    if tokens.len() < 2 || tokens.len() > 4 {
        return None;
    }

    let mut parts = [-1i32; 4];
    for (i, token) in tokens.iter().enumerate() {
        parts[i] = token.parse::<u16>().ok().map(i32::from)?;
    }
    Some(parts)
}

/// Product code derived from the product GUID and version
pub fn calculate_product_id(product_guid: Uuid, version: &str) -> Option<Uuid> {
    let hash = version_hash(version)?;
    Some(hash_guid_by_integer(product_guid, hash.wrapping_add(1)))
}

/// GUID counter that increments in GUID byte significance order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequentialGuid {
    current: Uuid,
}

impl SequentialGuid {
    pub fn new(start: Uuid) -> Self {
        Self { current: start }
    }

    pub fn current(&self) -> Uuid {
        self.current
    }

    /// Advance by one and return the new value
    pub fn next_guid(&mut self) -> Uuid {
        let mut bytes = self.current.to_bytes_le();
        for &index in ORDER_MAP.iter() {
            bytes[index] = bytes[index].wrapping_add(1);
            if bytes[index] != 0 {
                break;
            }
        }
        self.current = Uuid::from_bytes_le(bytes);
        self.current
    }
}

/// Algorithm used for component GUIDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuidAlgorithm {
    /// Start GUID offset by the hash of the seed
    #[default]
    Hashed,
    /// Start GUID incremented on every call, seed ignored
    Sequential,
}

/// Component GUID generator seeded by the project GUID
#[derive(Debug, Clone)]
pub struct GuidGenerator {
    algorithm: GuidAlgorithm,
    start: SequentialGuid,
}

impl GuidGenerator {
    pub fn new(start: Uuid, algorithm: GuidAlgorithm) -> Self {
        Self {
            algorithm,
            start: SequentialGuid::new(start),
        }
    }

    /// GUID for a seed string (usually a component id)
    pub fn new_guid(&mut self, seed: &str) -> Uuid {
        match self.algorithm {
            GuidAlgorithm::Hashed => {
                hash_guid_by_integer(self.start.current(), get_hash_code32(seed))
            }
            GuidAlgorithm::Sequential => self.start.next_guid(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> Uuid {
        Uuid::parse_str("6fe30b47-2577-43ad-9095-1861ba25889b").unwrap()
    }

    #[test]
    fn test_hash_code32_known_values() {
        assert_eq!(get_hash_code32(""), 757602046);
        assert_eq!(get_hash_code32("a"), -842352705);
        assert_eq!(get_hash_code32("ab"), -840386625);
        assert_eq!(get_hash_code32("abc"), 536991770);
        assert_eq!(get_hash_code32("abcd"), 1594742810);
        assert_eq!(get_hash_code32("abcde"), 398757997);
        assert_eq!(get_hash_code32("Component.MyApp.exe"), 1066705106);
    }

    #[test]
    fn test_hash_code32_is_stable_for_paths() {
        let path = r"ProgramFilesFolder\My Company\My Product\MyApp.exe";
        assert_eq!(get_hash_code32(path), -2114042708);
        assert_eq!(get_hash_code32(path), get_hash_code32(path));
    }

    #[test]
    fn test_hash_guid_by_integer() {
        assert_eq!(
            hash_guid_by_integer(start(), 1).to_string(),
            "6fe30b47-2577-43ad-9095-1861ba25889c"
        );
        assert_eq!(
            hash_guid_by_integer(start(), -1).to_string(),
            "6fe30b47-2577-43ad-9095-1861b924879a"
        );
    }

    #[test]
    fn test_version_hash() {
        assert_eq!(version_hash("1.0.0.0"), Some(268435456));
        assert_eq!(version_hash("1.0"), Some(269484031));
        assert_eq!(version_hash("2.3.4"), Some(540037119));
        assert_eq!(version_hash("1"), None);
        assert_eq!(version_hash("1.x"), None);
    }

    #[test]
    fn test_calculate_product_id() {
        assert_eq!(
            calculate_product_id(start(), "1.0.0.0").unwrap().to_string(),
            "6fe30b47-2577-43ad-9095-1861ca25889c"
        );
        assert_eq!(
            calculate_product_id(start(), "1.2.3").unwrap().to_string(),
            "6fe30b47-2577-43ad-9095-1861ca45c89b"
        );
    }

    #[test]
    fn test_sequential_guid_carries() {
        let guid = Uuid::parse_str("00000000-0000-0000-0000-0000000000ff").unwrap();
        let mut seq = SequentialGuid::new(guid);
        assert_eq!(
            seq.next_guid().to_string(),
            "00000000-0000-0000-0000-000000000100"
        );
        assert_eq!(
            seq.next_guid().to_string(),
            "00000000-0000-0000-0000-000000000101"
        );
    }

    #[test]
    fn test_generator_hashed_is_deterministic() {
        let mut gen = GuidGenerator::new(start(), GuidAlgorithm::Hashed);
        let a = gen.new_guid("Component.MyApp.exe");
        let b = gen.new_guid("Component.MyApp.exe");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "6fe30b47-2577-43ad-9095-1861f9b9286d");
        assert_ne!(a, gen.new_guid("Component.Other.dll"));
    }

    #[test]
    fn test_generator_sequential_ignores_seed() {
        let mut gen = GuidGenerator::new(start(), GuidAlgorithm::Sequential);
        let a = gen.new_guid("x");
        let b = gen.new_guid("x");
        assert_ne!(a, b);
    }

    #[test]
    fn test_guid_format() {
        let guid = start();
        assert_eq!(
            GuidFormat::Plain.format(&guid),
            "6fe30b47257743ad90951861ba25889b"
        );
        assert_eq!(
            GuidFormat::Registry.format(&guid),
            "{6FE30B47-2577-43AD-9095-1861BA25889B}"
        );
        assert_eq!(GuidFormat::from_str("B"), Some(GuidFormat::Braces));
        assert_eq!(GuidFormat::from_str("nope"), None);
    }
}
