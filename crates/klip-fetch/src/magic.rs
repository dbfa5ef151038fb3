//! Container signature validation for downloaded files.

/// Bytes needed to run every check (the AVI check reads offset 8..12).
const MIN_BYTES_NEEDED: usize = 12;

/// How many bytes callers should read from the head of the file.
pub const MAGIC_READ_LEN: usize = 16;

struct SignatureCheck {
    offset: usize,
    bytes: &'static [u8],
}

struct Signature {
    format: &'static str,
    checks: &'static [SignatureCheck],
}

// Order matters: the mov check (ftypqt) is a superset of the mp4 check
// (ftyp) and must come first.
const SIGNATURES: &[Signature] = &[
    Signature {
        format: "webm",
        checks: &[SignatureCheck {
            offset: 0,
            bytes: &[0x1a, 0x45, 0xdf, 0xa3],
        }],
    },
    Signature {
        format: "mov",
        checks: &[SignatureCheck {
            offset: 4,
            bytes: b"ftypqt",
        }],
    },
    Signature {
        format: "mp4",
        checks: &[SignatureCheck {
            offset: 4,
            bytes: b"ftyp",
        }],
    },
    Signature {
        format: "avi",
        checks: &[
            SignatureCheck {
                offset: 0,
                bytes: b"RIFF",
            },
            SignatureCheck {
                offset: 8,
                bytes: b"AVI ",
            },
        ],
    },
];

/// Identify the container format from the file's first bytes.
///
/// Returns the format name, or `None` when no known signature matches or
/// too few bytes were provided.
pub fn detect_container(head: &[u8]) -> Option<&'static str> {
    if head.len() < MIN_BYTES_NEEDED {
        return None;
    }

    SIGNATURES.iter().find_map(|sig| {
        let all_pass = sig.checks.iter().all(|check| {
            head.get(check.offset..check.offset + check.bytes.len())
                .is_some_and(|slice| slice == check.bytes)
        });
        all_pass.then_some(sig.format)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_known_containers() {
        let webm = [0x1a, 0x45, 0xdf, 0xa3, 0, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(detect_container(&webm), Some("webm"));

        let mut mp4 = [0u8; 16];
        mp4[4..8].copy_from_slice(b"ftyp");
        mp4[8..12].copy_from_slice(b"isom");
        assert_eq!(detect_container(&mp4), Some("mp4"));

        let mut mov = [0u8; 16];
        mov[4..10].copy_from_slice(b"ftypqt");
        assert_eq!(detect_container(&mov), Some("mov"));

        let mut avi = [0u8; 16];
        avi[0..4].copy_from_slice(b"RIFF");
        avi[8..12].copy_from_slice(b"AVI ");
        assert_eq!(detect_container(&avi), Some("avi"));
    }

    #[test]
    fn quicktime_beats_generic_mp4() {
        // ftypqt also matches the plain ftyp check; the more specific
        // signature must win.
        let mut head = [0u8; 16];
        head[4..10].copy_from_slice(b"ftypqt");
        assert_eq!(detect_container(&head), Some("mov"));
    }

    #[test]
    fn rejects_unknown_and_short_input() {
        assert_eq!(detect_container(b"<html><body>nope"), None);
        assert_eq!(detect_container(&[0x1a, 0x45, 0xdf, 0xa3]), None);
        assert_eq!(detect_container(&[]), None);
    }
}
