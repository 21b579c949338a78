//! Shared utility functions.

/// Encode a Rust string as a null-terminated wide (UTF-16) string.
pub fn encode_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_wide_appends_terminator() {
        let wide = encode_wide("ab");
        assert_eq!(wide, vec![b'a' as u16, b'b' as u16, 0]);
    }
}
