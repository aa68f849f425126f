//! Scheme-qualified image reference handling.
//!
//! References are opaque strings beyond their scheme prefix and the
//! registry/repository/tag/digest split needed to rewrite them between
//! modes.

use airlift_core::{MirrorError, Result};

pub const DOCKER_PROTOCOL: &str = "docker://";
pub const OCI_PROTOCOL: &str = "oci://";
pub const FILE_PROTOCOL: &str = "file://";

/// Transport scheme of a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Docker,
    Oci,
    File,
}

impl Scheme {
    pub fn prefix(&self) -> &'static str {
        match self {
            Scheme::Docker => DOCKER_PROTOCOL,
            Scheme::Oci => OCI_PROTOCOL,
            Scheme::File => FILE_PROTOCOL,
        }
    }

    /// Scheme of `reference`, if it carries a known prefix.
    pub fn of(reference: &str) -> Option<Scheme> {
        if reference.starts_with(DOCKER_PROTOCOL) {
            Some(Scheme::Docker)
        } else if reference.starts_with(OCI_PROTOCOL) {
            Some(Scheme::Oci)
        } else if reference.starts_with(FILE_PROTOCOL) {
            Some(Scheme::File)
        } else {
            None
        }
    }
}

/// The reference without its scheme prefix. Unprefixed input is returned
/// unchanged.
pub fn strip_scheme(reference: &str) -> &str {
    match reference.split_once("://") {
        Some((_, rest)) => rest,
        None => reference,
    }
}

/// Parsed registry-transport reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Registry hostname, possibly with a port.
    pub registry: String,
    /// Repository path below the registry.
    pub repository: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
}

impl ImageReference {
    /// Parse a reference with or without a `docker://` prefix.
    pub fn parse(reference: &str) -> Result<Self> {
        let stripped = strip_scheme(reference.trim());
        if stripped.is_empty() {
            return Err(MirrorError::InvalidReference {
                reference: reference.to_string(),
                message: "empty reference".to_string(),
            });
        }

        // Digest first, then the tag after the last path separator.
        let (name_tag, digest) = match stripped.rsplit_once('@') {
            Some((head, digest)) if digest.contains(':') => {
                (head.to_string(), Some(digest.to_string()))
            }
            Some(_) => {
                return Err(MirrorError::InvalidReference {
                    reference: reference.to_string(),
                    message: "digest must be algorithm:hex".to_string(),
                })
            }
            None => (stripped.to_string(), None),
        };

        let (name, tag) = split_tag(&name_tag);

        let (registry, repository) = match name.split_once('/') {
            Some((first, rest))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                if rest.is_empty() {
                    return Err(MirrorError::InvalidReference {
                        reference: reference.to_string(),
                        message: "empty repository".to_string(),
                    });
                }
                (first.to_string(), rest.to_string())
            }
            _ => (String::new(), name),
        };

        Ok(ImageReference {
            registry,
            repository,
            tag,
            digest,
        })
    }

    /// Last path segment of the repository.
    pub fn component(&self) -> &str {
        self.repository.rsplit('/').next().unwrap_or(&self.repository)
    }

    /// A tag usable on a destination: the explicit tag, or a truncated
    /// digest hex when the reference is digest-only.
    pub fn tag_or_digest_tag(&self) -> String {
        if let Some(tag) = &self.tag {
            return tag.clone();
        }
        if let Some(digest) = &self.digest {
            let hex = digest.split_once(':').map(|(_, h)| h).unwrap_or(digest);
            return hex.chars().take(12).collect();
        }
        "latest".to_string()
    }
}

fn split_tag(name_tag: &str) -> (String, Option<String>) {
    let tag_start = match name_tag.rfind('/') {
        Some(slash) => name_tag[slash..].rfind(':').map(|i| slash + i),
        // An all-digit suffix with no path is a registry port, not a tag.
        None => name_tag
            .rfind(':')
            .filter(|&i| !name_tag[i + 1..].chars().all(|c| c.is_ascii_digit())),
    };
    match tag_start {
        Some(i) => (
            name_tag[..i].to_string(),
            Some(name_tag[i + 1..].to_string()),
        ),
        None => (name_tag.to_string(), None),
    }
}
