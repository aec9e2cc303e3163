//! Lookaside cache access.
//!
//! Source tarballs live in a lookaside cache keyed by module, file name and
//! digest. Two caches are reachable: the Network Box one and the upstream
//! (Fedora) one. Which one a call talks to is always an explicit
//! [`LookasideTarget`].

pub mod curl;
pub mod sources;

pub use curl::CurlTransport;
pub use sources::{SourceEntry, SourcesFile};

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};

use crate::koji::ClientCertificates;

/// Digest algorithm used to key files in the lookaside cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashType {
    Sha256,
    #[default]
    Sha512,
}

impl HashType {
    /// Lower-case name, as used in URLs and form fields
    pub fn name(&self) -> &'static str {
        match self {
            HashType::Sha256 => "sha256",
            HashType::Sha512 => "sha512",
        }
    }

    /// Upper-case label, as used in the sources file
    pub fn label(&self) -> &'static str {
        match self {
            HashType::Sha256 => "SHA256",
            HashType::Sha512 => "SHA512",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_uppercase().as_str() {
            "SHA256" => Some(HashType::Sha256),
            "SHA512" => Some(HashType::Sha512),
            _ => None,
        }
    }

    /// Hex digest of everything `reader` yields
    pub fn digest_reader<R: Read>(&self, reader: &mut R) -> io::Result<String> {
        match self {
            HashType::Sha256 => digest_with::<Sha256, R>(reader),
            HashType::Sha512 => digest_with::<Sha512, R>(reader),
        }
    }

    pub fn digest_file(&self, path: &Path) -> io::Result<String> {
        let mut file = File::open(path)?;
        self.digest_reader(&mut file)
    }
}

fn digest_with<D: Digest, R: Read>(reader: &mut R) -> io::Result<String> {
    let mut hasher = D::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

impl fmt::Display for HashType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which lookaside cache to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookasideTarget {
    /// The Network Box cache
    Primary,
    /// The upstream (Fedora) cache
    Upstream,
}

/// Everything needed to reach one lookaside cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookasideEndpoint {
    /// Base download URL
    pub url: String,
    /// Upload CGI
    pub cgi: String,
    pub hash: HashType,
    /// `None` when the Koji config held no usable certificates
    pub certs: Option<ClientCertificates>,
}

impl LookasideEndpoint {
    /// `<url>/<module>/<file>/<hash>/<digest>/<file>`, with the hash the
    /// entry was recorded with
    pub fn download_url(&self, module: &str, entry: &SourceEntry) -> String {
        format!(
            "{}/{}/{}/{}/{}/{}",
            self.url.trim_end_matches('/'),
            module,
            entry.filename,
            entry.hash.name(),
            entry.digest,
            entry.filename
        )
    }
}

/// Both lookaside endpoints, built once per invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookasideEndpoints {
    pub primary: LookasideEndpoint,
    pub upstream: LookasideEndpoint,
}

impl LookasideEndpoints {
    pub fn get(&self, target: LookasideTarget) -> &LookasideEndpoint {
        match target {
            LookasideTarget::Primary => &self.primary,
            LookasideTarget::Upstream => &self.upstream,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_digest() {
        let digest = HashType::Sha256.digest_reader(&mut "abc".as_bytes()).unwrap();
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_sha512_digest_length() {
        let digest = HashType::Sha512.digest_reader(&mut "abc".as_bytes()).unwrap();
        assert_eq!(digest.len(), 128);
        assert!(digest.starts_with("ddaf35a193617aba"));
    }

    #[test]
    fn test_hash_labels() {
        assert_eq!(HashType::from_label("SHA512"), Some(HashType::Sha512));
        assert_eq!(HashType::from_label("sha256"), Some(HashType::Sha256));
        assert_eq!(HashType::from_label("MD5"), None);
        assert_eq!(HashType::Sha512.label(), "SHA512");
    }

    #[test]
    fn test_download_url() {
        let endpoint = LookasideEndpoint {
            url: "https://pkgs.example.com/repo/pkgs/".to_string(),
            cgi: "https://pkgs.example.com/repo/pkgs/upload.cgi".to_string(),
            hash: HashType::Sha512,
            certs: None,
        };
        assert_eq!(
            endpoint.download_url("bash", &SourceEntry::new(HashType::Sha512, "abcd", "bash-5.0.tar.gz")),
            "https://pkgs.example.com/repo/pkgs/bash/bash-5.0.tar.gz/sha512/abcd/bash-5.0.tar.gz"
        );
        assert_eq!(
            endpoint.download_url("bash", &SourceEntry::new(HashType::Sha256, "ef01", "x.patch")),
            "https://pkgs.example.com/repo/pkgs/bash/x.patch/sha256/ef01/x.patch"
        );
    }
}
