use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Read a file to string, replacing invalid UTF-8 sequences with the replacement character.
///
/// # Errors
/// Returns an error if the file cannot be read.
pub fn read_to_string_lossy(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Append each extension to `base` in order and return the first candidate that is a file.
///
/// Extensions are given with their leading dot (`".js"`). The base path itself is
/// not probed.
#[must_use]
pub fn probe_extensions(base: &Path, extensions: &[&str]) -> Option<PathBuf> {
    extensions.iter().find_map(|ext| {
        let mut candidate = base.as_os_str().to_os_string();
        candidate.push(ext);
        let candidate = PathBuf::from(candidate);
        candidate.is_file().then_some(candidate)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_read_to_string_lossy_valid_utf8() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        file.flush().unwrap();

        let content = read_to_string_lossy(file.path()).unwrap();
        assert_eq!(content, "hello world");
    }

    #[test]
    fn test_read_to_string_lossy_invalid_utf8() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0x48, 0x65, 0x6c, 0x6c, 0x6f, 0x80, 0x81])
            .unwrap();
        file.flush().unwrap();

        let content = read_to_string_lossy(file.path()).unwrap();
        assert!(content.starts_with("Hello"));
        assert!(content.contains('\u{FFFD}'));
    }

    #[test]
    fn test_probe_extensions_priority() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("entry.mjs"), "").unwrap();
        fs::write(dir.path().join("entry.ts"), "").unwrap();

        let found = probe_extensions(&dir.path().join("entry"), &[".js", ".mjs", ".ts"]).unwrap();
        assert!(found.ends_with("entry.mjs"));
    }

    #[test]
    fn test_probe_extensions_keeps_dotted_names() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("lodash.min.js"), "").unwrap();

        let found = probe_extensions(&dir.path().join("lodash.min"), &[".js"]).unwrap();
        assert!(found.ends_with("lodash.min.js"));
    }

    #[test]
    fn test_probe_extensions_none() {
        let dir = tempdir().unwrap();
        assert!(probe_extensions(&dir.path().join("missing"), &[".js", ".mjs"]).is_none());
    }
}
