//! Best-effort wiping of sensitive buffers.

use zeroize::Zeroize;

use crate::crypto::fill_random;

/// Random overwrite passes before the final zeroing pass
pub const WIPE_PASSES: usize = 5;

/// Overwrite `buffer` with random data several times, zero it, and release
/// its allocation.
///
/// Copies the allocator or OS made earlier (reallocations, swap) are out of
/// reach.
pub fn secure_wipe(buffer: &mut Vec<u8>) {
    for pass in 0..WIPE_PASSES {
        if fill_random(buffer.as_mut_slice()).is_err() {
            tracing::warn!("Random wipe pass {} failed; zeroizing only", pass);
            break;
        }
        std::hint::black_box(buffer.as_slice());
    }
    buffer.zeroize();
    buffer.shrink_to_fit();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wipe_empties_buffer() {
        let mut secret = b"hunter2 hunter2 hunter2".to_vec();
        secure_wipe(&mut secret);
        assert!(secret.is_empty());
        assert_eq!(secret.capacity(), 0);
    }

    #[test]
    fn test_wipe_empty_buffer() {
        let mut empty = Vec::new();
        secure_wipe(&mut empty);
        assert!(empty.is_empty());
    }
}
