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

use log::{debug, warn};

use super::defs::*;
use super::range::resolve_nonempty;
use crate::account::model::*;
use crate::support::error::Error;

/// The outcome of fetching a range of messages.
#[derive(Debug)]
pub struct Fetched<'a> {
    /// Every selected message, in folder order. Messages whose content
    /// could not be fetched have none.
    pub hits: Vec<Hit<'a>>,
    /// Set if any message failed to be fetched.
    pub error: Option<Error>,
}

impl Mailbox {
    /// Select the messages `range` addresses in the folder at `path`,
    /// fetching the content of any which don't have it yet from the blob
    /// store.
    ///
    /// Failing to fetch some messages does not prevent the others from being
    /// returned; the failures are summarised in `Fetched::error`.
    pub fn fetch_range(
        &mut self,
        path: &str,
        range: &str,
        mode: RangeMode,
    ) -> Result<Fetched<'_>, Error> {
        let ixs = resolve_nonempty(&self.folder(path)?.messages, range, mode)?;
        let error = self.fetch_content(path, &ixs)?;

        let folder = self.folder(path)?;
        Ok(Fetched {
            hits: ixs
                .into_iter()
                .map(|ix| Hit {
                    index: Seqnum::from_index(ix),
                    message: &folder.messages[ix],
                })
                .collect(),
            error,
        })
    }

    /// Fetch the content of the messages at `ixs` in the folder at `path`
    /// which only have a key, returning a summary of any failures.
    pub(super) fn fetch_content(
        &mut self,
        path: &str,
        ixs: &[usize],
    ) -> Result<Option<Error>, Error> {
        let blobs = self.blobs.clone();
        let fetcher = self.fetcher;
        let log_prefix = self.log_prefix.clone();

        let folder = self.folder_mut(path)?;
        let path = folder.path.clone();

        let wanted = ixs
            .iter()
            .filter_map(|&ix| {
                let message = folder.messages.get(ix)?;
                match (message.raw(), message.key.as_ref()) {
                    (None, Some(key)) => Some((ix, key.clone())),
                    _ => None,
                }
            })
            .collect::<Vec<_>>();
        if wanted.is_empty() {
            return Ok(None);
        }

        debug!(
            "{} Fetching {} message(s) for {}",
            log_prefix,
            wanted.len(),
            path
        );

        let mut results = Vec::with_capacity(wanted.len());
        match blobs {
            Some(ref blobs) => fetcher.run(
                wanted,
                |(ix, key)| {
                    let result = blobs.fetch(&key);
                    (ix, key, result)
                },
                |r| results.push(r),
            ),
            None => results.extend(wanted.into_iter().map(|(ix, key)| {
                let err = Error::BlobStore("no blob store".to_owned());
                (ix, key, Err(err))
            })),
        }

        let mut failed = 0;
        let mut first_failure = None;
        for (ix, key, result) in results {
            match result {
                Ok(raw) => folder.messages[ix].set_raw(raw),
                Err(e) => {
                    warn!(
                        "{} Failed to fetch {} for {}: {}",
                        log_prefix, key, path, e
                    );
                    failed += 1;
                    first_failure.get_or_insert_with(|| e.to_string());
                },
            }
        }

        Ok(first_failure.map(|first| Error::BlobFetch { failed, first }))
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use chrono::prelude::*;

    use super::super::test_prelude::*;
    use crate::account::blob::{BlobStore, MemoryBlobStore};

    fn set_up_stubs(store: &Arc<MemoryBlobStore>) -> Mailbox {
        let mut mb = set_up();
        mb.set_blob_store(Arc::clone(store) as Arc<dyn BlobStore>);
        for key in &["k1", "k2", "k3"] {
            mb.data
                .inbox
                .messages
                .push(Message::stub(key.to_string(), String::new()));
        }
        mb.reindex();
        mb
    }

    #[test]
    fn content_fetched_on_demand() {
        let store = Arc::new(MemoryBlobStore::new(10));
        let now = Utc::now();
        store.insert("k1", "Subject: one\r\n\r\n1\r\n", now);
        store.insert("k2", "Subject: two\r\n\r\n2\r\n", now);
        store.insert("k3", "Subject: three\r\n\r\n3\r\n", now);
        let mut mb = set_up_stubs(&store);

        let fetched = mb.fetch_range("INBOX", "2:*", RangeMode::Index).unwrap();
        assert!(fetched.error.is_none());
        assert_eq!(2, fetched.hits.len());
        assert_eq!(Seqnum::u(2), fetched.hits[0].index);
        assert_eq!(
            Some(&b"Subject: two\r\n\r\n2\r\n"[..]),
            fetched.hits[0].message.raw()
        );
        assert_eq!(
            Some("three"),
            fetched.hits[1].message.parsed().root.header_text("subject")
        );

        // Not fetched, since it wasn't asked for
        assert!(mb.folder("INBOX").unwrap().messages[0].raw().is_none());

        // Cached content is not fetched again
        store.remove("k2");
        let fetched = mb.fetch_range("INBOX", "2", RangeMode::Uid).unwrap();
        assert!(fetched.error.is_none());
        assert!(fetched.hits[0].message.raw().is_some());
    }

    #[test]
    fn partial_failure() {
        let store = Arc::new(MemoryBlobStore::new(10));
        store.insert("k2", "Subject: two\r\n\r\n2\r\n", Utc::now());
        let mut mb = set_up_stubs(&store);

        let fetched = mb.fetch_range("INBOX", "1:*", RangeMode::Uid).unwrap();
        assert_eq!(3, fetched.hits.len());
        assert!(fetched.hits[0].message.raw().is_none());
        assert!(fetched.hits[1].message.raw().is_some());
        assert!(fetched.hits[2].message.raw().is_none());
        assert_matches!(Some(Error::BlobFetch { failed: 2, .. }), fetched.error);
    }

    #[test]
    fn empty_range() {
        let store = Arc::new(MemoryBlobStore::new(10));
        let mut mb = set_up_stubs(&store);
        assert_matches!(
            Err(Error::NxMessage),
            mb.fetch_range("INBOX", "9", RangeMode::Uid)
        );
    }
}
