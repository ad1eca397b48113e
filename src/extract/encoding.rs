//! Text-encoding detection for the plaintext extractor.
//!
//! A thin adapter over `chardetng`: BOMs win outright, a NUL byte in the
//! sample marks the file as binary (no encoding), anything else is the
//! detector's best guess.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chardetng::EncodingDetector;
use encoding_rs::Encoding;

/// How much of the file the detector samples.
const SNIFF_LIMIT: usize = 64 * 1024;

/// Guess the encoding of `path`, or `None` when the content looks binary.
pub fn detect_encoding(path: &Path) -> std::io::Result<Option<&'static Encoding>> {
    let mut file = File::open(path)?;
    let mut sample = vec![0u8; SNIFF_LIMIT];
    let mut filled = 0;
    while filled < sample.len() {
        let n = file.read(&mut sample[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    sample.truncate(filled);

    Ok(sniff(&sample, filled < SNIFF_LIMIT))
}

fn sniff(sample: &[u8], sample_is_whole_file: bool) -> Option<&'static Encoding> {
    if let Some((encoding, _bom_len)) = Encoding::for_bom(sample) {
        return Some(encoding);
    }
    if memchr::memchr(0, sample).is_some() {
        return None;
    }
    let mut detector = EncodingDetector::new();
    detector.feed(sample, sample_is_whole_file);
    Some(detector.guess(None, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(bytes).expect("write");
        file
    }

    #[test]
    fn plain_ascii_detects_as_text() {
        let file = write_temp(b"just some ordinary text\n");
        let encoding = detect_encoding(file.path()).unwrap();
        assert!(encoding.is_some());
    }

    #[test]
    fn utf16_bom_wins() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "hello".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let file = write_temp(&bytes);
        let encoding = detect_encoding(file.path()).unwrap();
        assert_eq!(encoding, Some(encoding_rs::UTF_16LE));
    }

    #[test]
    fn nul_bytes_mean_binary() {
        let file = write_temp(b"\x7fELF\x00\x00\x00garbage");
        assert_eq!(detect_encoding(file.path()).unwrap(), None);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(detect_encoding(Path::new("/no/such/file")).is_err());
    }
}
