//! core type-safe wrappers for the hub store.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A SHA-256 content digest, hex encoded.
///
/// This is the canonical identity of a blob: it names the blob file and is
/// the only digest used for equality and reachability.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sha256Digest(String);

impl Sha256Digest {
    /// prefix used by the registry when it reports digests
    pub const PREFIX: &'static str = "sha256:";

    const HEX_LEN: usize = 64;

    /// parse a digest from its bare hex form
    pub fn from_hex(hex: impl Into<String>) -> Result<Self, InvalidDigestError> {
        let hex = hex.into();
        if hex.len() != Self::HEX_LEN {
            return Err(InvalidDigestError(hex));
        }
        if !hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(InvalidDigestError(hex));
        }
        Ok(Self(hex))
    }

    /// parse the registry form `sha256:<hex>`
    pub fn parse_prefixed(value: &str) -> Result<Self, InvalidDigestError> {
        match value.strip_prefix(Self::PREFIX) {
            Some(hex) => Self::from_hex(hex),
            None => Err(InvalidDigestError(value.to_string())),
        }
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(bytes))
    }

    /// the bare hex string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// short form used in human-facing output
    pub fn short(&self) -> &str {
        &self.0[..12]
    }

    /// the registry form `sha256:<hex>`
    pub fn prefixed(&self) -> String {
        format!("{}{}", Self::PREFIX, self.0)
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Sha256Digest {
    type Error = InvalidDigestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(value)
    }
}

impl From<Sha256Digest> for String {
    fn from(digest: Sha256Digest) -> Self {
        digest.0
    }
}

impl FromStr for Sha256Digest {
    type Err = InvalidDigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix(Self::PREFIX) {
            Some(hex) => Self::from_hex(hex),
            None => Self::from_hex(s),
        }
    }
}

/// error for strings that are not a well-formed SHA-256 digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidDigestError(pub String);

impl fmt::Display for InvalidDigestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid sha256 digest: '{}'", self.0)
    }
}

impl std::error::Error for InvalidDigestError {}

/// Validate a single path component (owner, pipe name, tag name).
///
/// Valid components:
/// - 1 to `max` characters
/// - ASCII alphanumerics, `.`, `_`, `-` only
/// - cannot start with `.` or `-`, cannot contain `..`
fn validate_component(name: &str, max: usize) -> Result<(), InvalidNameError> {
    if name.is_empty() {
        return Err(InvalidNameError::Empty);
    }

    if name.len() > max {
        return Err(InvalidNameError::TooLong(name.len()));
    }

    if let Some(first) = name.chars().next() {
        if first == '.' || first == '-' {
            return Err(InvalidNameError::InvalidStart(first));
        }
    }

    for (i, c) in name.chars().enumerate() {
        if !c.is_ascii_alphanumeric() && c != '_' && c != '-' && c != '.' {
            return Err(InvalidNameError::InvalidCharacter { char: c, position: i });
        }
    }

    if name.contains("..") {
        return Err(InvalidNameError::InvalidPath(name.to_string()));
    }

    Ok(())
}

/// Identity of a pipe: `(owner, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipeId {
    owner: String,
    name: String,
}

impl PipeId {
    const MAX_LEN: usize = 64;

    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self, InvalidNameError> {
        let owner = owner.into();
        let name = name.into();
        validate_component(&owner, Self::MAX_LEN)?;
        validate_component(&name, Self::MAX_LEN)?;
        Ok(Self { owner, name })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for PipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for PipeId {
    type Err = InvalidNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((owner, name)) => Self::new(owner, name),
            None => Err(InvalidNameError::MissingOwner(s.to_string())),
        }
    }
}

/// A validated tag name.
///
/// Tag names become file names under the pipe's `tags/` directory, so they
/// share the component restrictions of owners and pipe names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TagName(String);

impl TagName {
    /// tag used when none is given
    pub const LATEST: &'static str = "latest";

    const MAX_LEN: usize = 128;

    pub fn new(name: impl Into<String>) -> Result<Self, InvalidNameError> {
        let name = name.into();
        validate_component(&name, Self::MAX_LEN)?;
        Ok(Self(name))
    }

    pub fn latest() -> Self {
        Self(Self::LATEST.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TagName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for TagName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TagName {
    type Error = InvalidNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TagName> for String {
    fn from(tag: TagName) -> Self {
        tag.0
    }
}

impl FromStr for TagName {
    type Err = InvalidNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// A pipe reference as written on the command line: `<owner>/<name>[:<tag>]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipeRef {
    pub pipe: PipeId,
    pub tag: Option<TagName>,
}

impl PipeRef {
    /// the explicit tag, or `latest`
    pub fn tag_or_latest(&self) -> TagName {
        self.tag.clone().unwrap_or_else(TagName::latest)
    }
}

impl FromStr for PipeRef {
    type Err = InvalidNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (pipe, tag) = match s.rsplit_once(':') {
            Some((pipe, tag)) => (pipe, Some(TagName::new(tag)?)),
            None => (s, None),
        };
        Ok(Self {
            pipe: pipe.parse()?,
            tag,
        })
    }
}

impl fmt::Display for PipeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag {
            Some(tag) => write!(f, "{}:{}", self.pipe, tag),
            None => write!(f, "{}", self.pipe),
        }
    }
}

/// On-disk layout of a single pipe directory.
///
/// ```text
/// <hub>/<owner>/<name>/
///   blobs/<sha256>
///   tags/<tag>.ref      indirect pointer
///   tags/<tag>.yaml     editable content
///   index.json
///   HEAD
///   .lock
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipeLayout {
    pub pipe: PipeId,
    root: PathBuf,
}

impl PipeLayout {
    pub(crate) const BLOBS_DIR: &'static str = "blobs";
    pub(crate) const TAGS_DIR: &'static str = "tags";
    pub(crate) const INDEX_FILE: &'static str = "index.json";
    pub(crate) const HEAD_FILE: &'static str = "HEAD";
    pub(crate) const LOCK_FILE: &'static str = ".lock";
    pub(crate) const REF_EXT: &'static str = "ref";
    pub(crate) const EDITABLE_EXT: &'static str = "yaml";

    pub fn new(hub_root: &Path, pipe: PipeId) -> Self {
        let root = hub_root.join(pipe.owner()).join(pipe.name());
        Self { pipe, root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn blobs_dir(&self) -> PathBuf {
        self.root.join(Self::BLOBS_DIR)
    }

    pub fn blob_path(&self, digest: &Sha256Digest) -> PathBuf {
        self.blobs_dir().join(digest.as_str())
    }

    pub fn tags_dir(&self) -> PathBuf {
        self.root.join(Self::TAGS_DIR)
    }

    pub fn ref_path(&self, tag: &TagName) -> PathBuf {
        self.tags_dir().join(format!("{}.{}", tag, Self::REF_EXT))
    }

    pub fn editable_path(&self, tag: &TagName) -> PathBuf {
        self.tags_dir().join(format!("{}.{}", tag, Self::EDITABLE_EXT))
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(Self::INDEX_FILE)
    }

    pub fn head_path(&self) -> PathBuf {
        self.root.join(Self::HEAD_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(Self::LOCK_FILE)
    }
}

/// error type for invalid names (owners, pipes, tags)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidNameError {
    Empty,
    TooLong(usize),
    InvalidStart(char),
    InvalidCharacter { char: char, position: usize },
    InvalidPath(String),
    MissingOwner(String),
}

impl fmt::Display for InvalidNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "name cannot be empty"),
            Self::TooLong(len) => write!(f, "name too long: {} characters", len),
            Self::InvalidStart(c) => write!(f, "name cannot start with '{}'", c),
            Self::InvalidCharacter { char, position } => {
                write!(f, "invalid character '{}' at position {}", char, position)
            }
            Self::InvalidPath(path) => write!(f, "invalid path: '{}'", path),
            Self::MissingOwner(s) => {
                write!(f, "owner required in '{}': use <owner>/<name>[:<tag>]", s)
            }
        }
    }
}

impl std::error::Error for InvalidNameError {}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_SHA: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn test_digest_parsing() {
        let digest = Sha256Digest::from_hex(HELLO_SHA).unwrap();
        assert_eq!(digest.short(), "2cf24dba5fb0");
        assert_eq!(digest.prefixed(), format!("sha256:{}", HELLO_SHA));
        assert_eq!(Sha256Digest::parse_prefixed(&digest.prefixed()).unwrap(), digest);
        assert_eq!(format!("sha256:{}", HELLO_SHA).parse::<Sha256Digest>().unwrap(), digest);

        assert!(Sha256Digest::from_hex("abc").is_err());
        assert!(Sha256Digest::from_hex(HELLO_SHA.to_uppercase()).is_err());
        assert!(Sha256Digest::parse_prefixed(HELLO_SHA).is_err());
    }

    #[test]
    fn test_tag_name_valid() {
        assert!(TagName::new("latest").is_ok());
        assert!(TagName::new("v1.2.0").is_ok());
        assert!(TagName::new("release_candidate-2").is_ok());
    }

    #[test]
    fn test_tag_name_invalid() {
        assert!(TagName::new("").is_err());
        assert!(TagName::new(".hidden").is_err());
        assert!(TagName::new("-flag").is_err());
        assert!(TagName::new("a/b").is_err());
        assert!(TagName::new("a..b").is_err());
        assert!(TagName::new("x".repeat(129)).is_err());
    }

    #[test]
    fn test_pipe_ref_parsing() {
        let r: PipeRef = "alice/deploy:v2".parse().unwrap();
        assert_eq!(r.pipe.owner(), "alice");
        assert_eq!(r.pipe.name(), "deploy");
        assert_eq!(r.tag, Some(TagName::new("v2").unwrap()));

        let r: PipeRef = "alice/deploy".parse().unwrap();
        assert_eq!(r.tag, None);
        assert_eq!(r.tag_or_latest().as_str(), "latest");
        assert_eq!(r.to_string(), "alice/deploy");

        assert!(matches!(
            "deploy".parse::<PipeRef>(),
            Err(InvalidNameError::MissingOwner(_))
        ));
        assert!("alice/../etc".parse::<PipeRef>().is_err());
    }

    #[test]
    fn test_layout_paths() {
        let pipe = PipeId::new("alice", "deploy").unwrap();
        let layout = PipeLayout::new(Path::new("/hub"), pipe);
        let digest = Sha256Digest::from_hex(HELLO_SHA).unwrap();
        let tag = TagName::latest();

        assert_eq!(layout.root(), Path::new("/hub/alice/deploy"));
        assert_eq!(
            layout.blob_path(&digest),
            PathBuf::from(format!("/hub/alice/deploy/blobs/{}", HELLO_SHA))
        );
        assert_eq!(layout.ref_path(&tag), PathBuf::from("/hub/alice/deploy/tags/latest.ref"));
        assert_eq!(layout.editable_path(&tag), PathBuf::from("/hub/alice/deploy/tags/latest.yaml"));
        assert_eq!(layout.index_path(), PathBuf::from("/hub/alice/deploy/index.json"));
    }
}
