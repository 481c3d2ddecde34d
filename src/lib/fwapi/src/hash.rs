//! The symbol name hash.

/// Initial value of the hash state.
pub const HASH_SEED: u32 = 0x1505;

/// Hash a symbol name with the GNU-style `h = h * 33 + c` recurrence, seeded with
/// [HASH_SEED]. Bytes are consumed left to right and hashing stops at the first NUL, so a
/// NUL-terminated name hashes the same as the name without its terminator.
///
/// Any change here changes every hash in every generated table.
pub const fn gnu_hash(name: &str) -> u32 {
    let bytes = name.as_bytes();
    let mut h = HASH_SEED;
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c == 0 {
            break;
        }
        h = (h << 5).wrapping_add(h).wrapping_add(c as u32);
        i += 1;
    }
    h
}

#[cfg(test)]
mod test {
    use super::*;

    fn recurrence(name: &str) -> u32 {
        name.bytes()
            .fold(HASH_SEED, |h, c| h.wrapping_mul(33).wrapping_add(c as u32))
    }

    #[test]
    fn hash_ab() {
        let h1 = HASH_SEED * 33 + b'a' as u32;
        let h2 = h1 * 33 + b'b' as u32;
        assert_eq!(gnu_hash("ab"), h2);
        assert_eq!(gnu_hash("ab"), 5863208);
        assert_eq!(gnu_hash("ab"), gnu_hash("ab"));
    }

    #[test]
    fn empty_is_seed() {
        assert_eq!(gnu_hash(""), HASH_SEED);
    }

    #[test]
    fn stops_at_terminator() {
        assert_eq!(gnu_hash("furi_delay_ms\0"), gnu_hash("furi_delay_ms"));
        assert_eq!(gnu_hash("abc\0def"), gnu_hash("abc"));
    }

    #[test]
    fn matches_recurrence() {
        for name in [
            "a",
            "malloc",
            "furi_thread_alloc_ex",
            "a_rather_long_symbol_name_that_overflows_the_hash_state_several_times",
        ] {
            assert_eq!(gnu_hash(name), recurrence(name), "{}", name);
        }
    }

    #[test]
    fn usable_in_const() {
        const H: u32 = gnu_hash("ab");
        assert_eq!(H, 5863208);
    }
}
