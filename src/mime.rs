//! Filename-based MIME type guessing.
//!
//! A pure helper used by the Walker at classify time (spec §4.4); the
//! Analyser's extraction service verdict always supersedes this guess
//! once a row is analysed.

/// Guesses `(mime_type, encoding)` from a filename alone. `mime_type` is
/// always lowercase and always contains `/`; falls back to
/// `application/octet-stream` when nothing matches.
pub fn guess_mime_type(path: &str) -> (String, Option<String>) {
    let guess = mime_guess::from_path(path);
    let mime_type = guess
        .first()
        .map(|m| m.essence_str().to_lowercase())
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let encoding = if mime_type.starts_with("text/") {
        Some("utf-8".to_string())
    } else {
        None
    };

    (mime_type, encoding)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guesses_known_text_type() {
        let (mime, enc) = guess_mime_type("notes.txt");
        assert_eq!(mime, "text/plain");
        assert_eq!(enc.as_deref(), Some("utf-8"));
    }

    #[test]
    fn guesses_known_binary_type() {
        let (mime, enc) = guess_mime_type("photo.png");
        assert_eq!(mime, "image/png");
        assert_eq!(enc, None);
    }

    #[test]
    fn falls_back_for_unknown_extension() {
        let (mime, enc) = guess_mime_type("blob.unknownext12345");
        assert_eq!(mime, "application/octet-stream");
        assert_eq!(enc, None);
    }

    #[test]
    fn mime_type_always_contains_slash_and_is_lowercase() {
        for fname in ["a.TXT", "b.JPG", "c.unknownweird"] {
            let (mime, _) = guess_mime_type(fname);
            assert!(mime.contains('/'));
            assert_eq!(mime, mime.to_lowercase());
        }
    }
}
