// Copyright (C) 2026 The Loom MUD Authors
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Username index file: a small fixed-size header followed by fixed-width records, little-endian
//! throughout. Fixed width lets a future lookup seek by
//! ordinal in O(1) and keeps migration tooling simple; for now lookups are linear scans, which
//! is plenty for the record counts a single-process MUD carries.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use fs2::FileExt;
use thiserror::Error;
use unicase::UniCase;

pub const META_SIZE: u64 = 100;
pub const VERSION: u64 = 1;
pub const USERNAME_FIELD_LEN: usize = 80;
pub const RECORD_SIZE: u64 = 8 + USERNAME_FIELD_LEN as u64 + 1;

#[derive(Debug, Error)]
pub enum IndexFileError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("username '{0}' exceeds the {1}-byte index field")]
    UsernameTooLong(String, usize),
    #[error("index file has unexpected version {0}, expected {VERSION}")]
    VersionMismatch(u64),
    #[error("index file has unexpected record size {0}, expected {RECORD_SIZE}")]
    RecordSizeMismatch(u64),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IndexRecord {
    pub user_id: i64,
    pub username: String,
}

/// Writes a fresh index file containing exactly `records`, truncating any existing file.
pub fn write_all(path: impl AsRef<Path>, records: &[IndexRecord]) -> Result<(), IndexFileError> {
    let file = OpenOptions::new().create(true).write(true).truncate(true).open(path)?;
    write_to(file, records)
}

/// Rebuilds the index file under an exclusive OS file lock, so two concurrent rebuilds (e.g. a
/// startup repair racing an admin-triggered rebuild) can't interleave writes.
pub fn rebuild_exclusive(path: impl AsRef<Path>, records: &[IndexRecord]) -> Result<(), IndexFileError> {
    let file = OpenOptions::new().create(true).read(true).write(true).open(path)?;
    file.lock_exclusive()?;
    let result = write_to_truncating(&file, records);
    let _ = file.unlock();
    result
}

fn write_to(file: File, records: &[IndexRecord]) -> Result<(), IndexFileError> {
    write_to_truncating(&file, records)
}

fn write_to_truncating(file: &File, records: &[IndexRecord]) -> Result<(), IndexFileError> {
    let mut file = file.try_clone()?;
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;

    let mut header = vec![0u8; META_SIZE as usize];
    {
        let mut cursor = io::Cursor::new(&mut header[..32]);
        cursor.write_u64::<LittleEndian>(META_SIZE)?;
        cursor.write_u64::<LittleEndian>(VERSION)?;
        cursor.write_u64::<LittleEndian>(records.len() as u64)?;
        cursor.write_u64::<LittleEndian>(RECORD_SIZE)?;
    }
    file.write_all(&header)?;

    for record in records {
        file.write_all(&encode_record(record)?)?;
    }
    file.flush()?;
    Ok(())
}

fn encode_record(record: &IndexRecord) -> Result<[u8; RECORD_SIZE as usize], IndexFileError> {
    let bytes = record.username.as_bytes();
    if bytes.len() > USERNAME_FIELD_LEN {
        return Err(IndexFileError::UsernameTooLong(record.username.clone(), USERNAME_FIELD_LEN));
    }
    let mut buf = [0u8; RECORD_SIZE as usize];
    buf[0..8].copy_from_slice(&record.user_id.to_le_bytes());
    buf[8..8 + bytes.len()].copy_from_slice(bytes);
    // remaining username bytes and the terminator byte are already zero
    Ok(buf)
}

/// Reads the full index into memory. Returns `VersionMismatch`/`RecordSizeMismatch` if the file
/// was written by an incompatible version, which the registry treats as "missing" and rebuilds.
pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<IndexRecord>, IndexFileError> {
    let mut file = File::open(path)?;
    let mut header = [0u8; META_SIZE as usize];
    file.read_exact(&mut header)?;
    let mut cursor = io::Cursor::new(&header[..32]);
    let meta_size = cursor.read_u64::<LittleEndian>()?;
    let version = cursor.read_u64::<LittleEndian>()?;
    let record_count = cursor.read_u64::<LittleEndian>()?;
    let record_size = cursor.read_u64::<LittleEndian>()?;

    if version != VERSION {
        return Err(IndexFileError::VersionMismatch(version));
    }
    if record_size != RECORD_SIZE {
        return Err(IndexFileError::RecordSizeMismatch(record_size));
    }
    if meta_size != META_SIZE {
        file.seek(SeekFrom::Start(meta_size))?;
    }

    let mut records = Vec::with_capacity(record_count as usize);
    let mut buf = vec![0u8; record_size as usize];
    for _ in 0..record_count {
        file.read_exact(&mut buf)?;
        let user_id = i64::from_le_bytes(buf[0..8].try_into().unwrap());
        let name_bytes = &buf[8..8 + USERNAME_FIELD_LEN];
        let end = name_bytes.iter().position(|&b| b == 0).unwrap_or(USERNAME_FIELD_LEN);
        let username = String::from_utf8_lossy(&name_bytes[..end]).into_owned();
        records.push(IndexRecord { user_id, username });
    }
    Ok(records)
}

/// Case-insensitive linear lookup by username.
pub fn lookup(records: &[IndexRecord], username: &str) -> Option<i64> {
    let needle = UniCase::new(username);
    records.iter().find(|r| UniCase::new(r.username.as_str()) == needle).map(|r| r.user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_then_rebuild_yields_identical_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("users.idx");
        let records = vec![
            IndexRecord { user_id: 1, username: "alice".to_string() },
            IndexRecord { user_id: 2, username: "bob".to_string() },
        ];
        write_all(&path, &records).unwrap();
        let first_bytes = std::fs::read(&path).unwrap();

        rebuild_exclusive(&path, &records).unwrap();
        let second_bytes = std::fs::read(&path).unwrap();

        assert_eq!(first_bytes, second_bytes);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let records = vec![IndexRecord { user_id: 42, username: "Tester".to_string() }];
        assert_eq!(lookup(&records, "tester"), Some(42));
        assert_eq!(lookup(&records, "TESTER"), Some(42));
        assert_eq!(lookup(&records, "nope"), None);
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("users.idx");
        let records = vec![
            IndexRecord { user_id: 1, username: "alice".to_string() },
            IndexRecord { user_id: 2, username: "bob".to_string() },
        ];
        write_all(&path, &records).unwrap();
        let read_back = read_all(&path).unwrap();
        assert_eq!(read_back, records);
    }

    #[test]
    fn username_too_long_is_rejected() {
        let long_name = "x".repeat(81);
        let records = vec![IndexRecord { user_id: 1, username: long_name }];
        let dir = tempdir().unwrap();
        let path = dir.path().join("users.idx");
        assert!(write_all(&path, &records).is_err());
    }
}
