//! Shared fixtures for coupon integration tests

#![allow(dead_code)]

use kart_coupons::config::LoaderConfig;
use std::path::Path;
use tempfile::TempDir;

/// Temporary data directory holding the given `(file name, contents)` pairs
pub fn data_dir<S: AsRef<str>>(files: &[(&str, S)]) -> TempDir {
    let dir = tempfile::tempdir().expect("create temp data dir");
    for (name, contents) in files {
        write_source(dir.path(), name, contents.as_ref());
    }
    dir
}

pub fn write_source(dir: &Path, name: &str, contents: &str) {
    std::fs::write(dir.join(name), contents).expect("write source file");
}

/// Loader settings pointing at `dir` with small batches and few workers
pub fn loader_config(dir: &Path, files: &[&str], batch_size: usize) -> LoaderConfig {
    LoaderConfig {
        data_dir: dir.to_path_buf(),
        files: files.iter().map(|f| f.to_string()).collect(),
        batch_size,
        max_workers: 3,
        ..LoaderConfig::default()
    }
}

/// One code per line
pub fn lines(codes: &[&str]) -> String {
    codes.iter().map(|c| format!("{}\n", c)).collect()
}
