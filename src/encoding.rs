//! Text decoding and encoding for input files, templates and outputs.

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Default label used when a recipe doesn't name an encoding.
pub const DEFAULT_ENCODING: &str = "utf-8";

/// Looks up an encoding by its WHATWG label (`utf-8`, `latin1`, `shift_jis`, ...).
pub fn lookup(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| Error::EncodingError(format!("unknown encoding '{}'", label)))
}

/// The bare `utf-16` labels, which carry a byte order mark.
fn is_bom_utf16(label: &str) -> bool {
    matches!(label.trim().to_ascii_lowercase().as_str(), "utf-16" | "utf16")
}

/// Decodes bytes strictly: malformed input is an error.
///
/// A BOM is kept as content, except for the bare `utf-16` label where it picks
/// the byte order and is consumed.
pub fn decode(bytes: &[u8], label: &str) -> Result<String> {
    let mut encoding = lookup(label)?;
    let mut body = bytes;
    if is_bom_utf16(label) {
        if let Some((sniffed, bom_len)) = Encoding::for_bom(bytes) {
            if sniffed == UTF_16LE || sniffed == UTF_16BE {
                encoding = sniffed;
                body = &bytes[bom_len..];
            }
        }
    }
    encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .map(|text| text.into_owned())
        .ok_or_else(|| {
            Error::EncodingError(format!("input is not valid {}", encoding.name()))
        })
}

fn encode_utf16(text: &str, big_endian: bool, with_bom: bool) -> Vec<u8> {
    let bom = with_bom.then_some(0xFEFF_u16);
    bom.into_iter()
        .chain(text.encode_utf16())
        .flat_map(|unit| if big_endian { unit.to_be_bytes() } else { unit.to_le_bytes() })
        .collect()
}

/// Encodes text, failing on characters the target encoding can't represent.
///
/// UTF-16 is written directly since `encoding_rs` only encodes ASCII-compatible
/// encodings. The bare `utf-16` label writes a little-endian BOM first.
pub fn encode(text: &str, label: &str) -> Result<Vec<u8>> {
    let encoding = lookup(label)?;
    if encoding == UTF_16LE || encoding == UTF_16BE {
        return Ok(encode_utf16(text, encoding == UTF_16BE, is_bom_utf16(label)));
    }
    let (bytes, _, had_unmappable) = encoding.encode(text);
    if had_unmappable {
        return Err(Error::EncodingError(format!(
            "text contains characters not representable in {}",
            encoding.name()
        )));
    }
    Ok(bytes.into_owned())
}

/// Reads a whole file and decodes it with the given encoding label.
pub fn read_to_string<P: AsRef<Path>>(path: P, label: &str) -> Result<String> {
    let bytes = fs::read(path.as_ref()).map_err(Error::IoError)?;
    decode(&bytes, label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_latin1() {
        let text = decode(&[0x63, 0x61, 0x66, 0xe9], "latin1").unwrap();
        assert_eq!(text, "café");
    }

    #[test]
    fn test_decode_rejects_malformed_utf8() {
        assert!(matches!(
            decode(&[0xff, 0xfe, 0x41], "utf-8"),
            Err(Error::EncodingError(_))
        ));
    }

    #[test]
    fn test_unknown_label() {
        assert!(lookup("no-such-charset").is_err());
    }

    #[test]
    fn test_encode_unmappable() {
        assert!(encode("日本", "latin1").is_err());
        assert_eq!(encode("abc", "latin1").unwrap(), b"abc".to_vec());
    }

    #[test]
    fn test_encode_utf16() {
        assert_eq!(encode("ab", "utf-16").unwrap(), vec![0xff, 0xfe, 0x61, 0x00, 0x62, 0x00]);
        assert_eq!(encode("ab", "utf-16le").unwrap(), vec![0x61, 0x00, 0x62, 0x00]);
        assert_eq!(encode("ab", "utf-16be").unwrap(), vec![0x00, 0x61, 0x00, 0x62]);
        assert_eq!(encode("😀", "utf-16be").unwrap(), vec![0xd8, 0x3d, 0xde, 0x00]);
    }

    #[test]
    fn test_decode_utf16_bom() {
        assert_eq!(decode(&[0xff, 0xfe, 0x61, 0x00], "utf-16").unwrap(), "a");
        assert_eq!(decode(&[0xfe, 0xff, 0x00, 0x61], "utf-16").unwrap(), "a");
        assert_eq!(decode(&[0x61, 0x00], "utf-16").unwrap(), "a");
        assert_eq!(decode(&[0xff, 0xfe, 0x61, 0x00], "utf-16le").unwrap(), "\u{feff}a");

        let written = encode("héllo", "utf-16").unwrap();
        assert_eq!(decode(&written, "utf-16").unwrap(), "héllo");
    }
}
