use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{NbpkgError, Result};
use crate::lookaside::HashType;

/// One line of a `sources` file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    pub hash: HashType,
    pub digest: String,
    pub filename: String,
}

impl SourceEntry {
    pub fn new(hash: HashType, digest: impl Into<String>, filename: impl Into<String>) -> Self {
        SourceEntry {
            hash,
            digest: digest.into(),
            filename: filename.into(),
        }
    }
}

impl fmt::Display for SourceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) = {}", self.hash.label(), self.filename, self.digest)
    }
}

fn line_regex() -> &'static Regex {
    static LINE: OnceLock<Regex> = OnceLock::new();
    LINE.get_or_init(|| {
        Regex::new(r"^(\w+) \((.+)\) = ([0-9a-fA-F]+)$").expect("sources line regex is valid")
    })
}

/// A bare file name that stays inside the download directory
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(|c| c == '/' || c == '\\')
}

/// The `sources` file of a module: which lookaside files the package needs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourcesFile {
    entries: Vec<SourceEntry>,
}

impl SourcesFile {
    pub fn parse(content: &str) -> Result<Self> {
        let mut entries = Vec::new();

        for (number, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let caps = line_regex().captures(line).ok_or_else(|| {
                NbpkgError::lookaside(format!("Malformed sources line {}: {}", number + 1, line))
            })?;

            let hash = HashType::from_label(&caps[1]).ok_or_else(|| {
                NbpkgError::lookaside(format!("Unsupported hash type {} on line {}", &caps[1], number + 1))
            })?;

            let filename = &caps[2];
            if !is_plain_file_name(filename) {
                return Err(NbpkgError::lookaside(format!(
                    "Unsafe file name on sources line {}: {}",
                    number + 1,
                    filename
                )));
            }

            entries.push(SourceEntry::new(hash, caps[3].to_ascii_lowercase(), filename));
        }

        Ok(SourcesFile { entries })
    }

    /// Read `path`; a missing file is an empty sources list
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SourcesFile::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_string())?;
        Ok(())
    }

    pub fn entries(&self) -> &[SourceEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add `entry`, replacing any entry for the same file name
    pub fn add(&mut self, entry: SourceEntry) {
        match self.entries.iter_mut().find(|e| e.filename == entry.filename) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl fmt::Display for SourcesFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{}", entry)?;
        }
        Ok(())
    }
}

/// Make sure `.gitignore` in `dir` ignores each of `filenames`
pub fn ignore_files(dir: &Path, filenames: &[String]) -> Result<()> {
    let path = dir.join(".gitignore");
    let mut content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    let mut changed = false;
    for filename in filenames {
        let pattern = format!("/{}", filename);
        if content.lines().any(|line| line == pattern || line == filename) {
            continue;
        }
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        content.push_str(&pattern);
        content.push('\n');
        changed = true;
    }

    if changed {
        fs::write(&path, content)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse() {
        let sources = SourcesFile::parse(
            "SHA512 (bash-5.0.tar.gz) = ABCDEF0123\n\nSHA256 (patch.tar.xz) = 99\n",
        )
        .unwrap();
        assert_eq!(sources.entries().len(), 2);
        assert_eq!(sources.entries()[0].filename, "bash-5.0.tar.gz");
        assert_eq!(sources.entries()[0].digest, "abcdef0123");
        assert_eq!(sources.entries()[1].hash, HashType::Sha256);
    }

    #[test]
    fn test_parse_filename_with_spaces() {
        let sources = SourcesFile::parse("SHA512 (my file.tar) = 00\n").unwrap();
        assert_eq!(sources.entries()[0].filename, "my file.tar");
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        assert!(SourcesFile::parse("d41d8cd98f00b204e9800998ecf8427e  foo.tar.gz\n").is_err());
        assert!(SourcesFile::parse("MD5 (foo.tar.gz) = 00\n").is_err());
    }

    #[test]
    fn test_parse_rejects_paths() {
        for name in ["/etc/cron.d/evil", "../../../tmp/evil", "sub/dir.tar", "..", "a\\b.tar"] {
            let err = SourcesFile::parse(&format!("SHA512 (bash.tar) = 00\nSHA512 ({}) = 00\n", name))
                .unwrap_err();
            let msg = err.to_string();
            assert!(msg.contains("Unsafe file name on sources line 2"), "{}", msg);
            assert!(msg.contains(name));
        }
    }

    #[test]
    fn test_add_replaces_same_file() {
        let mut sources = SourcesFile::default();
        sources.add(SourceEntry::new(HashType::Sha512, "aa", "a.tar"));
        sources.add(SourceEntry::new(HashType::Sha512, "bb", "b.tar"));
        sources.add(SourceEntry::new(HashType::Sha512, "cc", "a.tar"));
        assert_eq!(
            sources.to_string(),
            "SHA512 (a.tar) = cc\nSHA512 (b.tar) = bb\n"
        );
    }

    #[test]
    fn test_load_missing_is_empty() {
        let dir = TempDir::new().unwrap();
        let sources = SourcesFile::load(&dir.path().join("sources")).unwrap();
        assert!(sources.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sources");
        let mut sources = SourcesFile::default();
        sources.add(SourceEntry::new(HashType::Sha512, "aa", "a.tar"));
        sources.save(&path).unwrap();
        assert_eq!(SourcesFile::load(&path).unwrap(), sources);
    }

    #[test]
    fn test_ignore_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".gitignore"), "/old.tar").unwrap();

        ignore_files(dir.path(), &["new.tar".to_string(), "old.tar".to_string()]).unwrap();
        ignore_files(dir.path(), &["new.tar".to_string()]).unwrap();

        let content = fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert_eq!(content, "/old.tar\n/new.tar\n");
    }
}
