//! Source files and the composite keys derived from them
//!
//! A source file's tag is the numeric suffix of its name (`couponbase2` -> 2).
//! Every stored row is keyed `<code>-<tag>`, so the store holds one row per
//! occurrence of a code per file.

use std::path::{Path, PathBuf};

use crate::error::IngestError;

/// Identifies which input file a code came from
pub type SourceTag = u32;

/// Storage key for `code` as read from the file tagged `tag`
pub fn coupon_key(code: &str, tag: SourceTag) -> String {
    format!("{}-{}", code, tag)
}

/// Extract the trailing integer of a file name
pub fn parse_source_tag(file_name: &str) -> Result<SourceTag, IngestError> {
    let stem_len = file_name
        .trim_end_matches(|c: char| c.is_ascii_digit())
        .len();
    let digits = &file_name[stem_len..];

    if digits.is_empty() {
        return Err(IngestError::MissingSourceTag(file_name.to_string()));
    }

    match digits.parse::<SourceTag>() {
        Ok(tag) if tag > 0 => Ok(tag),
        _ => Err(IngestError::InvalidSourceTag {
            name: file_name.to_string(),
            tag: digits.to_string(),
        }),
    }
}

/// An input file that exists on disk and carries a usable tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub name: String,
    pub tag: SourceTag,
}

impl SourceFile {
    /// Locate `name` under `data_dir` and derive its tag
    pub fn resolve(data_dir: &Path, name: &str) -> Result<Self, IngestError> {
        let path = data_dir.join(name);
        if !path.is_file() {
            return Err(IngestError::FileNotFound(path));
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string());
        let tag = parse_source_tag(&file_name)?;

        Ok(Self {
            path,
            name: file_name,
            tag,
        })
    }
}
