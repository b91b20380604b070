//! Small shared helpers: opaque id generation and sorted insertion.

use rand::Rng as _;

const THREAD_ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const THREAD_ID_LEN: usize = 8;

/// Generate an opaque 8-character lowercase alphanumeric identifier.
pub fn generate_thread_id() -> String {
    let mut rng = rand::rng();
    (0..THREAD_ID_LEN)
        .map(|_| THREAD_ID_ALPHABET[rng.random_range(0..THREAD_ID_ALPHABET.len())] as char)
        .collect()
}

/// Insert `value` into a sorted vector, keeping it sorted and free of
/// duplicates. Returns whether the value was actually inserted.
pub fn insert_sorted<T: Ord>(items: &mut Vec<T>, value: T) -> bool {
    match items.binary_search(&value) {
        Ok(_) => false,
        Err(position) => {
            items.insert(position, value);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_ids_are_short_and_alphanumeric() {
        for _ in 0..64 {
            let id = generate_thread_id();
            assert_eq!(id.len(), THREAD_ID_LEN);
            assert!(id.bytes().all(|b| THREAD_ID_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn insert_sorted_keeps_order_and_dedupes() {
        let mut states = Vec::new();
        for state in [10u32, 2, 7, 2, 1, 10] {
            insert_sorted(&mut states, state);
        }
        assert_eq!(states, vec![1, 2, 7, 10]);
    }
}
