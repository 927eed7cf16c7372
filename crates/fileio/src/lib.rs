//! `satchel-fileio`: small file helpers with `$VAR` path expansion.

pub mod expand;

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use expand::expand_env;

pub type FileIoResult<T> = Result<T, FileIoError>;

#[derive(Debug, Error)]
pub enum FileIoError {
    #[error("cannot read file <{path}>: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot create directory <{path}>: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write file <{path}>: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Read a whole file. Environment variables in `path` are expanded first.
pub fn read_file(path: &str) -> FileIoResult<Vec<u8>> {
    let path = PathBuf::from(expand_env(path));
    fs::read(&path).map_err(|source| FileIoError::Read { path, source })
}

/// Create (or truncate) `dir/name` and write every non-empty chunk in order.
///
/// `dir` is created when it is neither empty nor `.`; an empty or `.` dir writes
/// `name` relative to the working directory. Returns the path written.
pub fn write_file(dir: &str, name: &str, chunks: &[&[u8]]) -> FileIoResult<PathBuf> {
    let path = if dir.is_empty() || dir == "." {
        PathBuf::from(expand_env(name))
    } else {
        let dir = PathBuf::from(expand_env(dir));
        fs::create_dir_all(&dir).map_err(|source| FileIoError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        dir.join(expand_env(name))
    };

    let contents: Vec<u8> = chunks.iter().flat_map(|c| c.iter().copied()).collect();
    fs::write(&path, contents).map_err(|source| FileIoError::Write {
        path: path.clone(),
        source,
    })?;

    tracing::debug!(path = %path.display(), "file written");
    Ok(path)
}

/// Convenience for UTF-8 files.
pub fn read_to_string(path: &str) -> FileIoResult<String> {
    let bytes = read_file(path)?;
    String::from_utf8(bytes).map_err(|e| FileIoError::Read {
        path: Path::new(path).to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested/out");
        let dir = dir.to_str().unwrap();

        let path = write_file(dir, "hello.txt", &[b"hello ", b"", b"world"]).unwrap();
        assert!(path.ends_with("nested/out/hello.txt"));
        assert_eq!(read_file(path.to_str().unwrap()).unwrap(), b"hello world");
        assert_eq!(read_to_string(path.to_str().unwrap()).unwrap(), "hello world");
    }

    #[test]
    fn write_truncates_existing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_str().unwrap();

        write_file(dir, "f.txt", &[b"a much longer first version"]).unwrap();
        let path = write_file(dir, "f.txt", &[b"short"]).unwrap();
        assert_eq!(read_file(path.to_str().unwrap()).unwrap(), b"short");
    }

    #[test]
    fn missing_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope.txt");
        let err = read_file(missing.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, FileIoError::Read { .. }));
        assert!(err.to_string().contains("nope.txt"));
    }

    #[test]
    fn invalid_utf8_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_file(tmp.path().to_str().unwrap(), "bin", &[&[0xff, 0xfe]]).unwrap();
        assert!(read_to_string(path.to_str().unwrap()).is_err());
    }
}
