//! Hex formatting and parsing helpers

use std::fmt::Write;

/// Format bytes as an uppercase hex dump, `cols` bytes per line.
pub fn hexdump(data: &[u8], cols: usize) -> String {
    let mut out = String::with_capacity(data.len() * 3 + data.len() / cols.max(1) + 1);
    for (k, byte) in data.iter().enumerate() {
        let _ = write!(out, "{:02X} ", byte);
        if k % cols == cols - 1 {
            out.push('\n');
        }
    }
    out
}

/// Parse a whitespace-separated stream of hex bytes. Tokens that do not
/// parse contribute a zero byte.
pub fn parse_hex_stream(text: &str) -> Vec<u8> {
    text.split_whitespace()
        .map(|tok| u8::from_str_radix(tok, 16).unwrap_or(0))
        .collect()
}

/// Parse an attribute-style integer, accepting a `0x` prefix or plain
/// decimal. Unparseable input yields zero.
pub fn parse_int(text: &str) -> usize {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        usize::from_str_radix(hex, 16).unwrap_or(0)
    } else {
        text.parse().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hexdump_breaks_lines_at_cols() {
        let data: Vec<u8> = (0..16).collect();
        let dump = hexdump(&data, 8);
        assert_eq!(
            dump,
            "00 01 02 03 04 05 06 07 \n08 09 0A 0B 0C 0D 0E 0F \n"
        );
    }

    #[test]
    fn hexdump_partial_last_line() {
        let dump = hexdump(&[0xAB, 0xCD, 0xEF], 8);
        assert_eq!(dump, "AB CD EF ");
    }

    #[test]
    fn parse_hex_stream_accepts_mixed_whitespace() {
        assert_eq!(parse_hex_stream(" FF\n00\t12 "), vec![0xFF, 0x00, 0x12]);
    }

    #[test]
    fn parse_hex_stream_bad_token_is_zero() {
        assert_eq!(parse_hex_stream("FF zz 01"), vec![0xFF, 0x00, 0x01]);
    }

    #[test]
    fn parse_int_hex_and_decimal() {
        assert_eq!(parse_int("0x1000"), 0x1000);
        assert_eq!(parse_int("42"), 42);
        assert_eq!(parse_int(""), 0);
        assert_eq!(parse_int("0xZZ"), 0);
    }
}
