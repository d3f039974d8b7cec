//-
// Copyright (c) 2024, The Bucketmail Authors
//
// This file is part of Bucketmail.
//
// Bucketmail is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// Bucketmail is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for
// more details.
//
// You should have received a copy of the GNU General Public License along
// with Bucketmail. If not, see <http://www.gnu.org/licenses/>.

//! Object storage holding raw messages and mailbox snapshots.
//!
//! A store is scoped to one bucket. Keys are opaque flat names; listing
//! returns them in lexicographic order a page at a time, continuing after a
//! marker key.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::prelude::*;
use log::trace;

use crate::support::error::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub last_modified: DateTime<Utc>,
}

/// One page of a listing.
#[derive(Clone, Debug, Default)]
pub struct ObjectPage {
    pub objects: Vec<ObjectInfo>,
    /// If there are more objects, the marker to pass to get the next page.
    pub next_marker: Option<String>,
}

pub trait BlobStore: Send + Sync {
    /// Fetch the content of `key`.
    ///
    /// Fails with `Error::BlobNotFound` if there is no such object.
    fn fetch(&self, key: &str) -> Result<Vec<u8>, Error>;

    /// List objects whose keys sort strictly after `marker`.
    fn list(&self, marker: Option<&str>) -> Result<ObjectPage, Error>;

    /// Store `data` under `key`, replacing any existing object.
    fn put(&self, key: &str, data: &[u8]) -> Result<(), Error>;
}

fn page_of<'a>(
    keys: impl Iterator<Item = (&'a String, DateTime<Utc>)>,
    marker: Option<&str>,
    page_size: usize,
) -> ObjectPage {
    let mut keys =
        keys.filter(|&(k, _)| marker.map_or(true, |m| k.as_str() > m));
    let objects: Vec<ObjectInfo> = keys
        .by_ref()
        .take(page_size.max(1))
        .map(|(key, last_modified)| ObjectInfo {
            key: key.clone(),
            last_modified,
        })
        .collect();
    let next_marker = if keys.next().is_some() {
        objects.last().map(|o| o.key.clone())
    } else {
        None
    };

    ObjectPage {
        objects,
        next_marker,
    }
}

/// A store held entirely in memory.
#[derive(Debug)]
pub struct MemoryBlobStore {
    objects: Mutex<BTreeMap<String, (Vec<u8>, DateTime<Utc>)>>,
    page_size: usize,
}

impl MemoryBlobStore {
    pub fn new(page_size: usize) -> Self {
        MemoryBlobStore {
            objects: Mutex::new(BTreeMap::new()),
            page_size,
        }
    }

    /// Store `data` under `key` with the given modification time.
    pub fn insert(
        &self,
        key: &str,
        data: impl Into<Vec<u8>>,
        last_modified: DateTime<Utc>,
    ) {
        if let Ok(mut objects) = self.objects.lock() {
            objects.insert(key.to_owned(), (data.into(), last_modified));
        }
    }

    pub fn remove(&self, key: &str) {
        if let Ok(mut objects) = self.objects.lock() {
            objects.remove(key);
        }
    }

    fn poisoned() -> Error {
        Error::BlobStore("memory store lock poisoned".to_owned())
    }
}

impl BlobStore for MemoryBlobStore {
    fn fetch(&self, key: &str) -> Result<Vec<u8>, Error> {
        let objects = self.objects.lock().map_err(|_| Self::poisoned())?;
        objects
            .get(key)
            .map(|&(ref data, _)| data.clone())
            .ok_or_else(|| Error::BlobNotFound(key.to_owned()))
    }

    fn list(&self, marker: Option<&str>) -> Result<ObjectPage, Error> {
        let objects = self.objects.lock().map_err(|_| Self::poisoned())?;
        Ok(page_of(
            objects.iter().map(|(k, &(_, modified))| (k, modified)),
            marker,
            self.page_size,
        ))
    }

    fn put(&self, key: &str, data: &[u8]) -> Result<(), Error> {
        self.insert(key, data, Utc::now());
        Ok(())
    }
}

/// A store kept as one file per object in a directory.
#[derive(Debug)]
pub struct FsBlobStore {
    root: PathBuf,
    page_size: usize,
}

impl FsBlobStore {
    /// Open the store rooted at `root`, creating the directory if needed.
    pub fn open(root: PathBuf, page_size: usize) -> Result<Self, Error> {
        fs::create_dir_all(&root)?;
        Ok(FsBlobStore { root, page_size })
    }

    fn path_of(&self, key: &str) -> Result<PathBuf, Error> {
        if key.is_empty()
            || key.starts_with('.')
            || key.contains(|c| '/' == c || '\\' == c || '\0' == c)
        {
            return Err(Error::BlobStore(format!("unsafe key {:?}", key)));
        }

        Ok(self.root.join(key))
    }
}

impl BlobStore for FsBlobStore {
    fn fetch(&self, key: &str) -> Result<Vec<u8>, Error> {
        match fs::read(self.path_of(key)?) {
            Ok(data) => Ok(data),
            Err(e) if io::ErrorKind::NotFound == e.kind() => {
                Err(Error::BlobNotFound(key.to_owned()))
            },
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self, marker: Option<&str>) -> Result<ObjectPage, Error> {
        let mut keys = BTreeMap::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(name) => {
                    trace!("Skipping non-UTF-8 object name {:?}", name);
                    continue;
                },
            };
            // Temporary files from in-progress writes
            if name.starts_with('.') {
                continue;
            }

            let md = entry.metadata()?;
            if !md.is_file() {
                continue;
            }

            keys.insert(name, DateTime::<Utc>::from(md.modified()?));
        }

        Ok(page_of(
            keys.iter().map(|(k, &modified)| (k, modified)),
            marker,
            self.page_size,
        ))
    }

    fn put(&self, key: &str, data: &[u8]) -> Result<(), Error> {
        let path = self.path_of(key)?;
        let mut tmp = tempfile::Builder::new()
            .prefix(".tmp")
            .tempfile_in(&self.root)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use tempfile::TempDir;

    use super::*;

    fn keys(page: &ObjectPage) -> Vec<&str> {
        page.objects.iter().map(|o| o.key.as_str()).collect()
    }

    #[test]
    fn memory_store_pagination() {
        let store = MemoryBlobStore::new(2);
        let now = Utc::now();
        for key in &["c", "a", "b", "d", "e"] {
            store.insert(key, key.as_bytes(), now);
        }

        let page = store.list(None).unwrap();
        assert_eq!(vec!["a", "b"], keys(&page));
        assert_eq!(Some("b"), page.next_marker.as_deref());

        let page = store.list(Some("b")).unwrap();
        assert_eq!(vec!["c", "d"], keys(&page));

        let page = store.list(Some("d")).unwrap();
        assert_eq!(vec!["e"], keys(&page));
        assert_eq!(None, page.next_marker);

        let page = store.list(Some("e")).unwrap();
        assert!(page.objects.is_empty());
        assert_eq!(None, page.next_marker);
    }

    #[test]
    fn memory_store_fetch() {
        let store = MemoryBlobStore::new(10);
        store.put("k", b"data").unwrap();
        assert_eq!(b"data".to_vec(), store.fetch("k").unwrap());
        assert_matches!(Err(Error::BlobNotFound(..)), store.fetch("nx"));
    }

    #[test]
    fn fs_store_round_trip() {
        let root = TempDir::new().unwrap();
        let store =
            FsBlobStore::open(root.path().join("bucket"), 2).unwrap();

        store.put("one", b"1").unwrap();
        store.put("two", b"2").unwrap();
        store.put("three", b"3").unwrap();
        store.put("one", b"uno").unwrap();

        assert_eq!(b"uno".to_vec(), store.fetch("one").unwrap());
        assert_matches!(Err(Error::BlobNotFound(..)), store.fetch("four"));
        assert_matches!(Err(Error::BlobStore(..)), store.fetch("../one"));

        let page = store.list(None).unwrap();
        assert_eq!(vec!["one", "three"], keys(&page));
        let page = store.list(page.next_marker.as_deref()).unwrap();
        assert_eq!(vec!["two"], keys(&page));
        assert_eq!(None, page.next_marker);
    }
}
