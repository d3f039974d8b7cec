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

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{info, warn};

use super::defs::*;
use crate::account::blob::BlobStore;
use crate::support::error::Error;
use crate::support::log_prefix::LogPrefix;
use crate::support::system_config::SystemConfig;

fn forget_content(folders: &mut BTreeMap<String, Folder>) {
    for folder in folders.values_mut() {
        forget_folder_content(folder);
    }
}

fn forget_folder_content(folder: &mut Folder) {
    for message in &mut folder.messages {
        message.forget_content();
    }
    forget_content(&mut folder.folders);
}

impl Mailbox {
    /// Open the mailbox kept in `blobs`.
    ///
    /// The snapshot is loaded if there is one; otherwise the mailbox starts
    /// out empty. Either way, INBOX is then refreshed from the store.
    pub fn open(
        log_prefix: LogPrefix,
        config: Arc<SystemConfig>,
        blobs: Arc<dyn BlobStore>,
    ) -> Result<Self, Error> {
        let mut this = Mailbox::new(log_prefix, Arc::clone(&config));
        this.set_blob_store(Arc::clone(&blobs));

        match blobs.fetch(&config.storage.snapshot_key) {
            Ok(json) => this.load_json(&json)?,
            Err(Error::BlobNotFound(_)) => {
                info!("{} No snapshot, starting empty", this.log_prefix)
            },
            Err(e) => return Err(e),
        }

        this.refresh_inbox()?;
        Ok(this)
    }

    /// Replace the whole dataset.
    pub fn load(&mut self, data: Dataset) {
        self.data = data;
        self.reindex();
    }

    /// Replace the whole dataset with one serialised as JSON.
    pub fn load_json(&mut self, json: &[u8]) -> Result<(), Error> {
        let data: Dataset = serde_json::from_slice(json)?;
        self.load(data);
        info!(
            "{} Loaded snapshot with {} folder(s)",
            self.log_prefix,
            self.cache.len()
        );
        Ok(())
    }

    /// Discard everything, returning to the empty layout of the
    /// configuration.
    pub fn reset(&mut self) {
        warn!("{} Resetting mailbox", self.log_prefix);
        self.data = Dataset::from_config(&self.config);
        self.reindex();
    }

    /// Return a copy of the dataset suitable for persisting.
    ///
    /// Content which can be fetched from the blob store again is left out.
    pub fn snapshot(&self) -> Dataset {
        let mut data = self.data.clone();
        forget_folder_content(&mut data.inbox);
        for ns in data.namespaces.values_mut() {
            forget_content(&mut ns.folders);
        }
        data
    }

    pub fn snapshot_json(&self) -> Result<Vec<u8>, Error> {
        Ok(serde_json::to_vec(&self.snapshot())?)
    }

    /// Write the snapshot to the blob store.
    pub fn save(&self) -> Result<(), Error> {
        let blobs = self
            .blobs
            .as_ref()
            .ok_or_else(|| Error::BlobStore("no blob store".to_owned()))?;
        blobs.put(&self.config.storage.snapshot_key, &self.snapshot_json()?)?;
        info!("{} Saved snapshot", self.log_prefix);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use chrono::prelude::*;

    use super::super::test_prelude::*;
    use crate::account::blob::{BlobStore, MemoryBlobStore};
    use crate::support::log_prefix::LogPrefix;
    use crate::support::system_config::SystemConfig;

    #[test]
    fn save_and_reopen() {
        let store = Arc::new(MemoryBlobStore::new(10));
        let config = Arc::new(SystemConfig::default());

        let mut mb = Mailbox::open(
            LogPrefix::new("a".to_owned()),
            Arc::clone(&config),
            Arc::clone(&store) as Arc<dyn BlobStore>,
        )
        .unwrap();
        mb.create_folder("Archive/2024").unwrap();
        simple_append(&mut mb, "Archive/2024");
        mb.add_flags(
            "Archive/2024",
            "1",
            RangeMode::Uid,
            &flags(&["\\Seen"]),
        )
        .unwrap();
        mb.delete_folder("Archive/2024").unwrap();
        mb.create_folder("Archive/2025").unwrap();
        simple_append(&mut mb, "Archive/2025");
        mb.save().unwrap();

        let reopened = Mailbox::open(
            LogPrefix::new("b".to_owned()),
            config,
            store as Arc<dyn BlobStore>,
        )
        .unwrap();
        assert_eq!(
            vec!["Archive", "Archive/2025", "INBOX"],
            reopened.folder_paths().collect::<Vec<_>>()
        );
        let folder = reopened.folder("Archive/2025").unwrap();
        assert_eq!(1, folder.messages.len());
        assert_eq!(
            Some(&b"Subject: foo\r\n\r\nfoobar\r\n"[..]),
            folder.messages[0].raw()
        );
        assert_eq!(2, folder.uidnext);
        // The retired UIDs survive too
        assert!(reopened.dataset().retired.contains_key("Archive/2024"));
    }

    #[test]
    fn fetchable_content_left_out() {
        let store = Arc::new(MemoryBlobStore::new(10));
        store.insert("m1", "Subject: hi\r\n\r\nhi\r\n", Utc::now());
        let mut mb = Mailbox::open(
            LogPrefix::new("a".to_owned()),
            Arc::new(SystemConfig::default()),
            store as Arc<dyn BlobStore>,
        )
        .unwrap();

        mb.fetch_range("INBOX", "1", RangeMode::Index).unwrap();
        assert!(mb.folder("INBOX").unwrap().messages[0].raw().is_some());

        let snapshot = mb.snapshot();
        assert_eq!(1, snapshot.inbox.messages.len());
        assert!(snapshot.inbox.messages[0].raw().is_none());
        assert_eq!(Some("m1"), snapshot.inbox.marker.as_deref());
    }

    #[test]
    fn defaults_fill_in_sparse_snapshots() {
        let mut mb = set_up();
        mb.load_json(
            br#"{
                "INBOX": { "messages": [ { "uid": 4 }, { "raw": "x" } ] },
                "namespaces": { "": { "folders": { "Old": { "uidnext": 9 } } } }
            }"#,
        )
        .unwrap();

        let inbox = mb.folder("INBOX").unwrap();
        assert_eq!(Uid::u(4), inbox.messages[0].uid());
        assert_eq!(Uid::u(5), inbox.messages[1].uid());
        assert_eq!(6, inbox.uidnext);
        assert!(inbox.messages.iter().all(|m| !m.internaldate.is_empty()));

        let old = mb.folder("Old").unwrap();
        assert_eq!(9, old.uidnext);
        assert_eq!(1, old.uidvalidity);
        assert!(old.subscribed);
        assert!(old.has_flag("\\HasNoChildren"));
    }

    #[test]
    fn reset_clears_everything() {
        let mut mb = set_up();
        mb.create_folder("x").unwrap();
        simple_append(&mut mb, "INBOX");
        mb.reset();
        assert_eq!(vec!["INBOX"], mb.folder_paths().collect::<Vec<_>>());
        assert!(mb.folder("INBOX").unwrap().messages.is_empty());
    }

    #[test]
    fn corrupt_snapshot_is_an_error() {
        let store = Arc::new(MemoryBlobStore::new(10));
        store.insert("mbox.json", "{ not json", Utc::now());
        assert_matches!(
            Err(Error::Json(..)),
            Mailbox::open(
                LogPrefix::new("a".to_owned()),
                Arc::new(SystemConfig::default()),
                store as Arc<dyn BlobStore>,
            )
        );
    }
}
