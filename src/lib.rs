pub mod filter;
pub mod input;
pub mod ndjson;
pub mod output;
pub mod router;
pub mod value;
pub mod wrapper;

/// Strip a UTF-8 BOM (U+FEFF, bytes EF BB BF) from the start of a line.
pub fn strip_bom(buf: &[u8]) -> &[u8] {
    buf.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_bom_present() {
        let buf = [0xEF, 0xBB, 0xBF, b'"', b'h', b'i', b'"'];
        assert_eq!(strip_bom(&buf), b"\"hi\"");
    }

    #[test]
    fn strip_bom_absent() {
        assert_eq!(strip_bom(b"\"hi\""), b"\"hi\"");
    }

    #[test]
    fn strip_bom_empty() {
        assert!(strip_bom(b"").is_empty());
    }

    #[test]
    fn strip_bom_only_bom() {
        assert!(strip_bom(&[0xEF, 0xBB, 0xBF]).is_empty());
    }

    #[test]
    fn strip_bom_partial_prefix_is_kept() {
        assert_eq!(strip_bom(&[0xEF, 0xBB, b'1']), &[0xEF, 0xBB, b'1']);
    }
}
