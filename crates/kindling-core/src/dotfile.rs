use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use crate::error::ConfigError;

pub const DOTFILE_NAME: &str = ".env";

/// Reads `KEY=VALUE` pairs from a dotfile without touching the process
/// environment. Shell-style quoting and `export` prefixes are accepted.
///
/// Lines that do not parse are skipped; the file may be shared with other
/// tools. Only I/O failures are errors.
pub fn read_dotfile(path: &Path) -> Result<BTreeMap<String, String>, ConfigError> {
    let dotfile_error = |message: String| ConfigError::Dotfile {
        path: path.to_path_buf(),
        message,
    };

    let iter = dotenvy::from_path_iter(path).map_err(|err| dotfile_error(err.to_string()))?;
    let mut entries = BTreeMap::new();
    for item in iter {
        match item {
            Ok((key, value)) => {
                entries.insert(key, value);
            }
            Err(dotenvy::Error::LineParse(line, index)) => {
                debug!(path = %path.display(), %line, index, "skipping unparseable dotfile line");
            }
            Err(err) => return Err(dotfile_error(err.to_string())),
        }
    }
    Ok(entries)
}
