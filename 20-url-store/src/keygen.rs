//! Short key generation.

const KEY_ALPHABET: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Encodes `index` as a base-62 key. Small indices give short keys:
/// `0` is `"0"`, `61` is `"Z"`, `62` is `"10"`.
pub fn gen_key(mut index: usize) -> String {
    let base = KEY_ALPHABET.len();
    let mut digits = Vec::new();
    loop {
        digits.push(KEY_ALPHABET[index % base]);
        index /= base;
        if index == 0 {
            break;
        }
    }
    digits.reverse();
    // Every byte comes from the ASCII alphabet.
    digits.into_iter().map(char::from).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn first_keys_are_single_characters() {
        assert_eq!(gen_key(0), "0");
        assert_eq!(gen_key(9), "9");
        assert_eq!(gen_key(10), "a");
        assert_eq!(gen_key(36), "A");
        assert_eq!(gen_key(61), "Z");
    }

    #[test]
    fn keys_grow_with_the_index() {
        assert_eq!(gen_key(62), "10");
        assert_eq!(gen_key(62 * 62 - 1), "ZZ");
        assert_eq!(gen_key(62 * 62), "100");
    }

    #[test]
    fn distinct_indices_give_distinct_keys() {
        let keys: HashSet<String> = (0..10_000).map(gen_key).collect();
        assert_eq!(keys.len(), 10_000);
    }
}
