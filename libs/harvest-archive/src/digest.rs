//! Incremental digests for record blocks and payloads

use sha1::Sha1;
use sha2::{Digest as _, Sha256};

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    Sha1,
    Sha256,
}

impl DigestAlgorithm {
    /// Label used in `WARC-*-Digest` headers.
    pub fn label(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha1 => "sha1",
            DigestAlgorithm::Sha256 => "sha256",
        }
    }

    /// Parses a label, ASCII case-insensitive (`sha1`, `sha-1`, `sha256`, `sha-256`).
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "sha1" | "sha-1" => Some(DigestAlgorithm::Sha1),
            "sha256" | "sha-256" => Some(DigestAlgorithm::Sha256),
            _ => None,
        }
    }

    /// Starts a new accumulator.
    pub fn hasher(&self) -> DigestState {
        match self {
            DigestAlgorithm::Sha1 => DigestState::Sha1(Sha1::new()),
            DigestAlgorithm::Sha256 => DigestState::Sha256(Sha256::new()),
        }
    }
}

/// Running digest accumulator.
#[derive(Clone)]
pub enum DigestState {
    Sha1(Sha1),
    Sha256(Sha256),
}

impl DigestState {
    pub fn update(&mut self, data: &[u8]) {
        match self {
            DigestState::Sha1(h) => h.update(data),
            DigestState::Sha256(h) => h.update(data),
        }
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        match self {
            DigestState::Sha1(_) => DigestAlgorithm::Sha1,
            DigestState::Sha256(_) => DigestAlgorithm::Sha256,
        }
    }

    pub fn finalize(self) -> Digest {
        match self {
            DigestState::Sha1(h) => Digest {
                algorithm: DigestAlgorithm::Sha1,
                bytes: h.finalize().to_vec(),
            },
            DigestState::Sha256(h) => Digest {
                algorithm: DigestAlgorithm::Sha256,
                bytes: h.finalize().to_vec(),
            },
        }
    }
}

impl std::fmt::Debug for DigestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DigestState({})", self.algorithm().label())
    }
}

/// A finished digest value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    pub algorithm: DigestAlgorithm,
    pub bytes: Vec<u8>,
}

impl Digest {
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.algorithm.label(), self.to_hex())
    }
}
