//! A directory of [`Segment`]s with exactly one active segment receiving
//! writes, a reader-writer lock serializing puts/compaction against reads,
//! and a compactor that fires on a size-threshold pre-flight check.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use parking_lot::RwLock;
use tracing::info;

use crate::{
    error::{Error, Result},
    record::TypeTag,
    segment::Segment,
};

const ACTIVE_SEGMENT_NAME: &str = "current-data";
const OLDER_SEGMENT_PREFIX: &str = "segment-";
/// Loose lower bound on per-record overhead used by the size pre-flight
/// check. It undercounts the type-tag field (`"string"`/`"int64"` plus its
/// own 4-byte length prefix), so the active segment may cross the
/// configured threshold by a few bytes before compaction triggers on the
/// *next* put. Documented, not tuned.
const RECORD_METADATA_OVERHEAD: u64 = 16;

/// Directory and size-threshold configuration for a [`Store`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub dir: PathBuf,
    pub segment_size_bytes: u64,
}

impl StoreConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            segment_size_bytes: Self::default_segment_size(),
        }
    }

    pub const fn default_segment_size() -> u64 {
        10 * 1024 * 1024
    }

    pub fn with_segment_size(mut self, bytes: u64) -> Self {
        self.segment_size_bytes = bytes;
        self
    }
}

struct StoreInner {
    dir: PathBuf,
    segment_size_bytes: u64,
    active: Segment,
    /// Older segments in creation order: `older[i]` is `segment-{i}`.
    older: Vec<Segment>,
}

/// An append-only segmented key-value store. See module docs for the
/// concurrency discipline.
pub struct Store {
    inner: RwLock<StoreInner>,
}

impl Store {
    /// Opens (or creates) the store directory, recovering every segment
    /// found in it. A torn trailing record in any segment is fatal.
    pub fn open(config: StoreConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.dir)?;

        let mut active = None;
        let mut numbered_older = Vec::new();
        for entry in std::fs::read_dir(&config.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == ACTIVE_SEGMENT_NAME {
                active = Some(Segment::open(entry.path())?);
            } else if let Some(suffix) = name.strip_prefix(OLDER_SEGMENT_PREFIX) {
                let number: u64 = suffix
                    .parse()
                    .map_err(|_| Error::Corrupt(format!("unexpected segment file name {name:?}")))?;
                numbered_older.push((number, Segment::open(entry.path())?));
            }
        }
        numbered_older.sort_by_key(|(n, _)| *n);
        let older: Vec<Segment> = numbered_older.into_iter().map(|(_, s)| s).collect();
        let active = match active {
            Some(a) => a,
            None => Segment::open(config.dir.join(ACTIVE_SEGMENT_NAME))?,
        };

        info!(
            dir = %config.dir.display(),
            older_segments = older.len(),
            "opened store"
        );

        Ok(Store {
            inner: RwLock::new(StoreInner {
                dir: config.dir,
                segment_size_bytes: config.segment_size_bytes,
                active,
                older,
            }),
        })
    }

    /// Every write already went through `File::write_all`, so there is
    /// nothing left to flush; `close` exists to give callers a clean
    /// lifecycle hook and to make the store unusable afterward.
    pub fn close(self) -> Result<()> {
        Ok(())
    }

    pub fn put(&self, key: &str, value: &str) -> Result<()> {
        self.put_tagged(key, value, TypeTag::Text)
    }

    pub fn put_int64(&self, key: &str, value: i64) -> Result<()> {
        self.put_tagged(key, &value.to_string(), TypeTag::Int64)
    }

    fn put_tagged(&self, key: &str, value: &str, tag: TypeTag) -> Result<()> {
        let mut inner = self.inner.write();
        let estimate = key.len() as u64 + value.len() as u64 + RECORD_METADATA_OVERHEAD;
        if inner.active.write_offset() + estimate >= inner.segment_size_bytes {
            inner.compact()?;
        }
        inner.active.append(key, value, tag)
    }

    pub fn get(&self, key: &str) -> Result<String> {
        self.inner.read().get_tagged(key, TypeTag::Text)
    }

    pub fn get_int64(&self, key: &str) -> Result<i64> {
        let text = self.inner.read().get_tagged(key, TypeTag::Int64)?;
        text.parse::<i64>().map_err(|_| Error::WrongType)
    }

    /// Test/diagnostic helper: names of every segment file currently on
    /// disk, active segment last.
    pub fn segment_names(&self) -> Vec<String> {
        let inner = self.inner.read();
        let mut names: Vec<String> = inner
            .older
            .iter()
            .map(|s| file_name(s.path()))
            .collect();
        names.push(file_name(inner.active.path()));
        names
    }

    /// Test/diagnostic helper: total bytes used by all segment files.
    pub fn total_bytes_on_disk(&self) -> Result<u64> {
        let inner = self.inner.read();
        let mut total = inner.active.file_len()?;
        for seg in &inner.older {
            total += seg.file_len()?;
        }
        Ok(total)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl StoreInner {
    /// Searches the active segment first, then older segments from newest
    /// to oldest. A hit is accepted only if its tag matches `want`;
    /// otherwise the search continues into the next segment, so a key
    /// whose type changed between compactions can still be found at the
    /// one segment authoritative for its current type.
    fn get_tagged(&self, key: &str, want: TypeTag) -> Result<String> {
        if let Ok((value, tag)) = self.active.lookup(key) {
            if tag == want {
                return Ok(value);
            }
        }
        for seg in self.older.iter().rev() {
            if let Ok((value, tag)) = seg.lookup(key) {
                if tag == want {
                    return Ok(value);
                }
            }
        }
        Err(Error::NotFound)
    }

    /// Merges the active segment into whichever older segments shadow its
    /// keys, moves the rest into a fresh older segment, then empties the
    /// active segment. Runs entirely under the writer guard.
    fn compact(&mut self) -> Result<()> {
        let active_keys: Vec<String> = self.active.keys().map(String::from).collect();

        let mut shadowed_by: HashMap<usize, Vec<String>> = HashMap::new();
        let mut fresh = Vec::new();
        for key in &active_keys {
            match self.older.iter().position(|seg| seg.contains_key(key)) {
                Some(idx) => shadowed_by.entry(idx).or_default().push(key.clone()),
                None => fresh.push(key.clone()),
            }
        }

        for (idx, keys) in shadowed_by {
            let mut merged: HashMap<String, (String, TypeTag)> = HashMap::new();
            {
                let seg = &self.older[idx];
                for k in seg.keys().map(String::from).collect::<Vec<_>>() {
                    merged.insert(k.clone(), seg.lookup(&k)?);
                }
            }
            for key in &keys {
                merged.insert(key.clone(), self.active.lookup(key)?);
            }
            let seg = &mut self.older[idx];
            seg.truncate()?;
            for (key, (value, tag)) in merged {
                seg.append(&key, &value, tag)?;
            }
        }

        if !fresh.is_empty() {
            let number = self.older.len();
            let path = self.dir.join(format!("{OLDER_SEGMENT_PREFIX}{number}"));
            let mut new_segment = Segment::open(path)?;
            for key in &fresh {
                let (value, tag) = self.active.lookup(key)?;
                new_segment.append(key, &value, tag)?;
            }
            self.older.push(new_segment);
        }

        self.active.truncate()?;
        info!(
            older_segments = self.older.len(),
            "ran compaction"
        );
        Ok(())
    }
}
