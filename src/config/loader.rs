//! Configuration source resolution and document parsing.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use serde_yaml::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::DEFAULT_CONFIG_PATH;
use crate::error::ConfigError;

/// File extensions picked up when scanning a configuration directory.
pub const RECOGNIZED_EXTENSIONS: [&str; 2] = ["yml", "yaml"];

/// Determines which files make up the configuration for a given path string.
#[derive(Debug, Clone)]
pub struct SourceResolver {
    default_path: PathBuf,
}

impl Default for SourceResolver {
    fn default() -> Self {
        Self {
            default_path: PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }
}

impl SourceResolver {
    /// Creates a resolver using [`DEFAULT_CONFIG_PATH`] as the fallback file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the file used when no configuration path is given.
    pub fn with_default_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.default_path = path.into();
        self
    }

    /// Returns the fallback file.
    pub fn default_path(&self) -> &Path {
        &self.default_path
    }

    /// Resolves a configuration path into an ordered list of sources.
    ///
    /// A blank path falls back to the default file, and to no sources at all
    /// when that file is absent. A directory is scanned recursively for
    /// `.yml` and `.yaml` files, sorted by full path. Anything else is taken
    /// as a single file.
    pub fn resolve(&self, config_path: Option<&str>) -> Result<Vec<SourceRef>, ConfigError> {
        let config_path = match config_path.filter(|p| !p.trim().is_empty()) {
            Some(path) => PathBuf::from(path),
            None => {
                if self.default_path.is_file() {
                    return Ok(vec![SourceRef::new(&self.default_path)]);
                }
                debug!(path = ?self.default_path, "No default configuration file");
                return Ok(Vec::new());
            }
        };

        if !config_path.exists() {
            return Err(ConfigError::SourceNotFound { path: config_path });
        }

        if config_path.is_dir() {
            return scan_directory(&config_path);
        }

        Ok(vec![SourceRef::new(&config_path)])
    }
}

/// Recursively collects recognized configuration files below `dir`.
fn scan_directory(dir: &Path) -> Result<Vec<SourceRef>, ConfigError> {
    let mut paths = Vec::new();

    for entry in walkdir::WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|e| ConfigError::ReadFailed {
            path: e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf()),
            source: e.into(),
        })?;

        if entry.file_type().is_file() && has_recognized_extension(entry.path()) {
            paths.push(entry.into_path());
        }
    }

    paths.sort();
    debug!(dir = ?dir, count = paths.len(), "Scanned configuration directory");

    Ok(paths.iter().map(|p| SourceRef::new(p)).collect())
}

fn has_recognized_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| RECOGNIZED_EXTENSIONS.contains(&ext))
}

/// A resolved, not yet opened configuration source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    /// Display name: the base filename.
    pub name: String,
    /// Location on disk.
    pub path: PathBuf,
}

impl SourceRef {
    /// Creates a source named after the file's base name.
    pub fn new(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Self {
            name,
            path: path.to_path_buf(),
        }
    }

    /// Opens the source for reading. The handle is released when the returned
    /// value is dropped.
    pub fn open(&self) -> Result<ConfigSource, ConfigError> {
        let file = File::open(&self.path).map_err(|e| ConfigError::ReadFailed {
            path: self.path.clone(),
            source: e,
        })?;

        Ok(ConfigSource {
            name: self.name.clone(),
            path: self.path.clone(),
            reader: BufReader::new(file),
        })
    }
}

/// An open configuration source owning its file handle.
#[derive(Debug)]
pub struct ConfigSource {
    name: String,
    path: PathBuf,
    reader: BufReader<File>,
}

impl ConfigSource {
    /// Reads the remaining content and parses it, consuming the source.
    ///
    /// Returns the document together with the SHA-256 digest of the raw bytes.
    /// Content that is not valid UTF-8 is a parse failure, not a read failure.
    pub fn into_document(mut self) -> Result<(Document, String), ConfigError> {
        let mut content = Vec::new();
        self.reader
            .read_to_end(&mut content)
            .map_err(|e| ConfigError::ReadFailed {
                path: self.path.clone(),
                source: e,
            })?;

        let digest = compute_hash(&content);
        let document = Document::parse_slice(&self.name, &content)?;
        Ok((document, digest))
    }
}

/// A parsed configuration document: top-level keys in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    entries: Vec<(String, Value)>,
}

impl Document {
    /// Parses YAML text. `source_name` is only used in error messages.
    ///
    /// An empty document has no entries. Any other top-level value that is
    /// not a mapping with string keys is rejected.
    pub fn parse_str(source_name: &str, content: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_yaml::from_str(content).map_err(|e| parse_error(source_name, e))?;
        Self::from_value(source_name, value)
    }

    /// Parses raw YAML bytes.
    pub fn parse_slice(source_name: &str, content: &[u8]) -> Result<Self, ConfigError> {
        let value: Value =
            serde_yaml::from_slice(content).map_err(|e| parse_error(source_name, e))?;
        Self::from_value(source_name, value)
    }

    /// Parses YAML from a reader.
    pub fn from_reader<R: Read>(source_name: &str, reader: R) -> Result<Self, ConfigError> {
        let value: Value =
            serde_yaml::from_reader(reader).map_err(|e| parse_error(source_name, e))?;
        Self::from_value(source_name, value)
    }

    fn from_value(source_name: &str, value: Value) -> Result<Self, ConfigError> {
        let mapping = match value {
            Value::Null => return Ok(Self::default()),
            Value::Mapping(mapping) => mapping,
            other => {
                return Err(ConfigError::ParseFailed {
                    source_name: source_name.to_string(),
                    message: format!(
                        "top-level value must be a mapping, found {}",
                        value_kind(&other)
                    ),
                })
            }
        };

        let mut entries = Vec::with_capacity(mapping.len());
        for (key, value) in mapping {
            match key {
                Value::String(key) => entries.push((key, value)),
                other => {
                    return Err(ConfigError::ParseFailed {
                        source_name: source_name.to_string(),
                        message: format!(
                            "top-level keys must be strings, found {}",
                            value_kind(&other)
                        ),
                    })
                }
            }
        }

        Ok(Self { entries })
    }

    /// Iterates over the top-level entries in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the top-level keys in document order.
    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|(k, _)| k.as_str()).collect()
    }

    /// Looks up a top-level entry.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Number of top-level entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the document has no top-level entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_error(source_name: &str, e: serde_yaml::Error) -> ConfigError {
    ConfigError::ParseFailed {
        source_name: source_name.to_string(),
        message: e.to_string(),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

/// Computes the SHA256 hash of the given content.
fn compute_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn names(sources: &[SourceRef]) -> Vec<&str> {
        sources.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn blank_path_without_default_file_has_no_sources() {
        let dir = TempDir::new().unwrap();
        let resolver = SourceResolver::new().with_default_path(dir.path().join("casc.yaml"));

        assert!(resolver.resolve(None).unwrap().is_empty());
        assert!(resolver.resolve(Some("")).unwrap().is_empty());
        assert!(resolver.resolve(Some("   ")).unwrap().is_empty());
    }

    #[test]
    fn blank_path_uses_default_file_when_present() {
        let dir = TempDir::new().unwrap();
        let default = dir.path().join("casc.yaml");
        fs::write(&default, "system: {}\n").unwrap();
        let resolver = SourceResolver::new().with_default_path(&default);

        let sources = resolver.resolve(None).unwrap();
        assert_eq!(names(&sources), vec!["casc.yaml"]);
        assert_eq!(sources[0].path, default);
    }

    #[test]
    fn directory_scan_keeps_only_recognized_files_in_path_order() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.yml"), "b: 1\n").unwrap();
        fs::write(dir.path().join("a.yaml"), "a: 1\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "not: configuration\n").unwrap();
        fs::write(dir.path().join("upper.YAML"), "x: 1\n").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c.yaml"), "c: 1\n").unwrap();
        fs::write(dir.path().join("nested").join("readme.md"), "# hi\n").unwrap();

        let resolver = SourceResolver::new();
        let sources = resolver
            .resolve(Some(dir.path().to_str().unwrap()))
            .unwrap();

        assert_eq!(names(&sources), vec!["a.yaml", "b.yml", "c.yaml"]);
    }

    #[test]
    fn empty_directory_has_no_sources() {
        let dir = TempDir::new().unwrap();
        let sources = SourceResolver::new()
            .resolve(Some(dir.path().to_str().unwrap()))
            .unwrap();
        assert!(sources.is_empty());
    }

    #[test]
    fn explicit_file_is_sole_source_whatever_its_extension() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("settings.conf");
        fs::write(&file, "system: {}\n").unwrap();

        let sources = SourceResolver::new()
            .resolve(Some(file.to_str().unwrap()))
            .unwrap();
        assert_eq!(names(&sources), vec!["settings.conf"]);
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.yaml");

        let err = SourceResolver::new()
            .resolve(Some(missing.to_str().unwrap()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::SourceNotFound { ref path } if *path == missing));
    }

    #[cfg(unix)]
    #[test]
    fn directory_scan_follows_symlinked_files() {
        let elsewhere = TempDir::new().unwrap();
        let target = elsewhere.path().join("base.yaml");
        fs::write(&target, "system: {}\n").unwrap();

        let dir = TempDir::new().unwrap();
        std::os::unix::fs::symlink(&target, dir.path().join("base.yaml")).unwrap();
        fs::write(dir.path().join("local.yaml"), "tools: {}\n").unwrap();

        let sources = SourceResolver::new()
            .resolve(Some(dir.path().to_str().unwrap()))
            .unwrap();

        assert_eq!(names(&sources), vec!["base.yaml", "local.yaml"]);
        assert_eq!(sources[0].path, dir.path().join("base.yaml"));
    }

    #[test]
    fn surrounding_whitespace_is_part_of_the_path() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("casc.yaml"), "system: {}\n").unwrap();
        let padded = format!(" {}", dir.path().join("casc.yaml").display());

        let err = SourceResolver::new().resolve(Some(&padded)).unwrap_err();
        assert!(matches!(err, ConfigError::SourceNotFound { .. }));
    }

    #[test]
    fn invalid_utf8_source_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("binary.yaml");
        fs::write(&file, b"system: \xff\xfe\n").unwrap();

        let err = SourceRef::new(&file)
            .open()
            .unwrap()
            .into_document()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ParseFailed { ref source_name, .. } if source_name == "binary.yaml"
        ));
    }

    #[test]
    fn opened_source_yields_document_and_digest() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("casc.yaml");
        fs::write(&file, "system:\n  executors: 4\ntools: []\n").unwrap();

        let (document, digest) = SourceRef::new(&file).open().unwrap().into_document().unwrap();

        assert_eq!(document.keys(), vec!["system", "tools"]);
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, compute_hash(b"system:\n  executors: 4\ntools: []\n"));
    }

    #[test]
    fn document_preserves_key_order() {
        let doc = Document::parse_str("test", "zeta: 1\nalpha: 2\nmid: 3\n").unwrap();
        assert_eq!(doc.keys(), vec!["zeta", "alpha", "mid"]);
        assert_eq!(doc.get("alpha"), Some(&Value::from(2)));
        assert_eq!(doc.len(), 3);
    }

    #[test]
    fn empty_document_has_no_entries() {
        let doc = Document::parse_str("empty.yaml", "").unwrap();
        assert!(doc.is_empty());

        let doc = Document::parse_str("comments.yaml", "# nothing here\n").unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let err = Document::parse_str("broken.yaml", "system: [unclosed\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ParseFailed { ref source_name, .. } if source_name == "broken.yaml"
        ));
    }

    #[test]
    fn non_mapping_document_is_a_parse_error() {
        let err = Document::parse_str("list.yaml", "- a\n- b\n").unwrap_err();
        match err {
            ConfigError::ParseFailed { message, .. } => assert!(message.contains("a sequence")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn non_string_top_level_key_is_a_parse_error() {
        let err = Document::parse_str("keys.yaml", "42: answer\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseFailed { .. }));
    }

    #[test]
    fn reader_and_str_parsing_agree() {
        let text = "security:\n  realm:\n    allow_signup: false\n";
        let from_reader = Document::from_reader("r", text.as_bytes()).unwrap();
        let from_str = Document::parse_str("s", text).unwrap();
        assert_eq!(from_reader, from_str);
    }
}
