#![allow(dead_code)]

use std::io::Write;

use tempfile::NamedTempFile;

pub use remotewatch_test_utils::{
    builders, fakes, init_tracing, with_timeout, with_virtual_timeout,
};

/// Write `contents` to a fresh temporary TOML file.
pub fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", contents).unwrap();
    file
}
