use serde::Serialize;

/// Descriptor for one instrumentable function, as produced by the reflection exporter.
///
/// `internalID` indexes into the parallel address/name/bitset tables carried by
/// [`crate::catalogue::ReflectionCatalogue`]; it is otherwise opaque.
#[derive(Debug, Clone, Serialize)]
pub struct FuncInfo {
    pub valid: bool,
    pub internal_id: i64,
    pub is_static: bool,
    pub is_method: bool,
    pub address: u64,
    pub name: String,
}

impl FuncInfo {
    pub fn invalid() -> Self {
        Self {
            valid: false,
            internal_id: -1,
            is_static: false,
            is_method: false,
            address: 0,
            name: String::new(),
        }
    }
}

/// Reads one bit out of a packed bitset stored as `u64` words, little-bit-first within
/// each word (`wordIndex = id / 64`, `bitIndex = id % 64`).
pub fn get_bit(words: &[u64], id: i64) -> bool {
    if id < 0 {
        return false;
    }
    let id = id as u64;
    let word_index = (id / 64) as usize;
    let bit_index = id % 64;
    match words.get(word_index) {
        Some(word) => (word >> bit_index) & 1 == 1,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_accessor_reads_expected_positions() {
        // bit 0 and bit 65 set
        let words = [0b1u64, 0b10u64];
        assert!(get_bit(&words, 0));
        assert!(!get_bit(&words, 1));
        assert!(get_bit(&words, 65));
        assert!(!get_bit(&words, 64));
    }

    #[test]
    fn bit_accessor_out_of_range_is_false() {
        let words = [0u64];
        assert!(!get_bit(&words, 1000));
        assert!(!get_bit(&words, -1));
    }
}
