//! Local Store
//!
//! Directory-backed byte storage addressed by file name.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, ShardError};

use super::naming;

/// Result of a `store` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOutcome {
    pub file_name: String,

    /// Bytes the sender announced
    pub declared: u64,

    /// Bytes actually written
    pub written: u64,
}

impl StoreOutcome {
    pub fn is_complete(&self) -> bool {
        self.written == self.declared
    }

    /// Turn a short write into a `PartialTransfer` error
    pub fn into_result(self) -> Result<Self> {
        if self.is_complete() {
            Ok(self)
        } else {
            Err(ShardError::PartialTransfer {
                name: self.file_name,
                expected: self.declared,
                received: self.written,
            })
        }
    }
}

/// Stores whole files in one directory
///
/// No locking: concurrent writers of the same name race and the last one
/// to finish wins.
#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    /// Open or create the store directory
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of `file_name`, rejecting anything outside the directory
    pub fn path_of(&self, file_name: &str) -> Result<PathBuf> {
        naming::validate_name(file_name)?;
        Ok(self.dir.join(file_name))
    }

    /// Persist up to `size` bytes from `src` as `file_name`
    ///
    /// Overwrites an existing file. A short stream leaves whatever arrived
    /// on disk and reports it through `StoreOutcome::written`.
    pub fn store<R: Read>(&self, file_name: &str, size: u64, src: &mut R) -> Result<StoreOutcome> {
        let path = self.path_of(file_name)?;
        let mut writer = BufWriter::new(File::create(&path)?);
        let written = io::copy(&mut src.take(size), &mut writer)?;
        writer.flush()?;

        let outcome = StoreOutcome {
            file_name: file_name.to_string(),
            declared: size,
            written,
        };
        if !outcome.is_complete() {
            tracing::warn!(
                "Incomplete transfer for {}: expected {} bytes, got {}",
                file_name,
                size,
                written
            );
        }
        Ok(outcome)
    }

    /// Open `file_name` for reading along with its length
    pub fn fetch(&self, file_name: &str) -> Result<Option<(u64, File)>> {
        let path = self.path_of(file_name)?;
        match File::open(&path) {
            Ok(file) => {
                let meta = file.metadata()?;
                if !meta.is_file() {
                    return Ok(None);
                }
                Ok(Some((meta.len(), file)))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Reader over `length` bytes of `file_name` starting at `offset`
    pub fn read_range(&self, file_name: &str, offset: u64, length: u64) -> Result<io::Take<File>> {
        let (_, mut file) = self
            .fetch(file_name)?
            .ok_or_else(|| ShardError::NotFound(file_name.to_string()))?;
        file.seek(SeekFrom::Start(offset))?;
        Ok(file.take(length))
    }

    /// Length of `file_name`, if it exists
    pub fn len_of(&self, file_name: &str) -> Result<Option<u64>> {
        Ok(self.fetch(file_name)?.map(|(len, _)| len))
    }

    pub fn exists(&self, file_name: &str) -> Result<bool> {
        Ok(self.len_of(file_name)?.is_some())
    }

    /// Names of all regular files, in directory order
    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => tracing::debug!("Skipping non UTF-8 file name {:?}", raw),
            }
        }
        Ok(names)
    }

    /// Remove `file_name`; `false` if it was not there
    pub fn delete(&self, file_name: &str) -> Result<bool> {
        let path = self.path_of(file_name)?;
        if !path.is_file() {
            return Ok(false);
        }
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove every part of `logical`, returning how many went
    pub fn delete_cascade(&self, logical: &str) -> Result<usize> {
        naming::validate_name(logical)?;
        let mut deleted = 0;
        for file_name in self.list()? {
            if !naming::is_part_of(&file_name, logical) {
                continue;
            }
            if self.delete(&file_name)? {
                tracing::debug!("Cascade removed {}", file_name);
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}
