//! One append-only file plus the in-memory offset index for its own keys.

use std::{
    collections::HashMap,
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::{
    error::{Error, Result},
    record::{self, TypeTag},
};

pub struct Segment {
    path: PathBuf,
    file: File,
    write_offset: u64,
    index: HashMap<String, u64>,
}

impl Segment {
    /// Opens `path` for append (creating it if absent) and recovers the
    /// index by decoding every record from offset 0.
    pub fn open(path: PathBuf) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut segment = Segment {
            path,
            file,
            write_offset: 0,
            index: HashMap::new(),
        };
        segment.recover()?;
        debug!(
            path = %segment.path.display(),
            keys = segment.index.len(),
            write_offset = segment.write_offset,
            "recovered segment"
        );
        Ok(segment)
    }

    fn recover(&mut self) -> Result<()> {
        let mut reader = File::open(&self.path)?;
        let mut offset = 0u64;
        let mut index = HashMap::new();
        loop {
            let mut len_buf = [0u8; 4];
            let mut read = 0usize;
            while read < 4 {
                let n = reader.read(&mut len_buf[read..])?;
                if n == 0 {
                    break;
                }
                read += n;
            }
            if read == 0 {
                break; // clean end of file between records
            }
            if read < 4 {
                warn!(path = %self.path.display(), "torn length prefix during recovery");
                return Err(Error::Corrupt(format!(
                    "torn length prefix ({read} of 4 bytes) at offset {offset}"
                )));
            }
            let total_len = u32::from_le_bytes(len_buf) as usize;
            if total_len < 4 {
                return Err(Error::Corrupt(format!(
                    "invalid total_len {total_len} at offset {offset}"
                )));
            }
            let mut rest = vec![0u8; total_len - 4];
            reader.read_exact(&mut rest).map_err(|e| {
                warn!(path = %self.path.display(), "torn trailing record during recovery");
                Error::Corrupt(format!("torn record at offset {offset}: {e}"))
            })?;
            let mut full = Vec::with_capacity(total_len);
            full.extend_from_slice(&len_buf);
            full.extend_from_slice(&rest);
            let rec = record::decode(&full)?;
            index.insert(rec.key, offset);
            offset += total_len as u64;
        }
        self.index = index;
        self.write_offset = offset;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_offset(&self) -> u64 {
        self.write_offset
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Appends one record. On a write error the index is left unchanged, so
    /// a failed append never makes a stale offset reachable.
    pub fn append(&mut self, key: &str, value: &str, tag: TypeTag) -> Result<()> {
        let bytes = record::encode(key, value, tag);
        self.file.write_all(&bytes)?;
        self.index.insert(key.to_string(), self.write_offset);
        self.write_offset += bytes.len() as u64;
        Ok(())
    }

    /// Returns the value and tag of the most recent record for `key`, or
    /// `NotFound` if this segment's index has no entry for it.
    pub fn lookup(&self, key: &str) -> Result<(String, TypeTag)> {
        let offset = *self.index.get(key).ok_or(Error::NotFound)?;
        let rec = self.read_record_at(offset)?;
        if rec.key != key {
            // The index pointed at a record with the wrong key: the index
            // and the file have diverged, which should be impossible.
            return Err(Error::Corrupt(format!(
                "index pointed at offset {offset} expecting key {key:?}, found {:?}",
                rec.key
            )));
        }
        Ok((rec.value, rec.tag))
    }

    fn read_record_at(&self, offset: u64) -> Result<record::Record> {
        let mut reader = File::open(&self.path)?;
        reader.seek(SeekFrom::Start(offset))?;
        let mut len_buf = [0u8; 4];
        reader.read_exact(&mut len_buf)?;
        let total_len = u32::from_le_bytes(len_buf) as usize;
        if total_len < 4 {
            return Err(Error::Corrupt(format!("invalid total_len {total_len}")));
        }
        let mut rest = vec![0u8; total_len - 4];
        reader.read_exact(&mut rest)?;
        let mut full = Vec::with_capacity(total_len);
        full.extend_from_slice(&len_buf);
        full.extend_from_slice(&rest);
        record::decode(&full)
    }

    pub fn file_len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Resets the file to zero length, clears the index, and resets
    /// `write_offset` to 0. Closes the append handle before truncating and
    /// reopens it afterward: truncating a file out from under a handle
    /// positioned at EOF can leave that handle's cursor stale on some
    /// filesystems.
    pub fn truncate(&mut self) -> Result<()> {
        let write_handle = OpenOptions::new().write(true).open(&self.path)?;
        drop(std::mem::replace(&mut self.file, write_handle));
        self.file.set_len(0)?;
        let append_handle = OpenOptions::new().append(true).open(&self.path)?;
        drop(std::mem::replace(&mut self.file, append_handle));
        self.index.clear();
        self.write_offset = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segment");
        std::mem::forget(dir);
        path
    }

    #[test]
    fn append_then_lookup() {
        let mut seg = Segment::open(temp_path()).unwrap();
        seg.append("a", "1", TypeTag::Text).unwrap();
        seg.append("b", "2", TypeTag::Int64).unwrap();
        assert_eq!(seg.lookup("a").unwrap(), ("1".to_string(), TypeTag::Text));
        assert_eq!(seg.lookup("b").unwrap(), ("2".to_string(), TypeTag::Int64));
        assert!(matches!(seg.lookup("missing"), Err(Error::NotFound)));
    }

    #[test]
    fn later_append_supersedes_earlier() {
        let mut seg = Segment::open(temp_path()).unwrap();
        seg.append("k", "v1", TypeTag::Text).unwrap();
        seg.append("k", "v2", TypeTag::Text).unwrap();
        assert_eq!(seg.lookup("k").unwrap().0, "v2");
        assert_eq!(seg.len(), 1);
    }

    #[test]
    fn recovers_existing_file() {
        let path = temp_path();
        {
            let mut seg = Segment::open(path.clone()).unwrap();
            seg.append("k1", "v1", TypeTag::Text).unwrap();
            seg.append("k2", "42", TypeTag::Int64).unwrap();
        }
        let seg = Segment::open(path).unwrap();
        assert_eq!(seg.lookup("k1").unwrap().0, "v1");
        assert_eq!(seg.lookup("k2").unwrap(), ("42".to_string(), TypeTag::Int64));
        assert_eq!(seg.len(), 2);
    }

    #[test]
    fn truncate_resets_everything() {
        let mut seg = Segment::open(temp_path()).unwrap();
        seg.append("k", "v", TypeTag::Text).unwrap();
        seg.truncate().unwrap();
        assert_eq!(seg.len(), 0);
        assert_eq!(seg.write_offset(), 0);
        assert_eq!(seg.file_len().unwrap(), 0);
        assert!(matches!(seg.lookup("k"), Err(Error::NotFound)));
        seg.append("k2", "v2", TypeTag::Text).unwrap();
        assert_eq!(seg.lookup("k2").unwrap().0, "v2");
    }

    #[test]
    fn detects_torn_trailing_record() {
        let path = temp_path();
        {
            let mut seg = Segment::open(path.clone()).unwrap();
            seg.append("k", "v", TypeTag::Text).unwrap();
        }
        let len = std::fs::metadata(&path).unwrap().len();
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(len - 3).unwrap();
        drop(file);
        assert!(matches!(Segment::open(path), Err(Error::Corrupt(_))));
    }
}
