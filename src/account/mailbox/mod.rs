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

//! The folder tree and messages of one user's mailbox.
//!
//! The tree has two kinds of roots: INBOX, which is always present, and the
//! namespaces, each a map of top-level folders keyed by name. Every folder
//! owns its messages and child folders. A flat cache maps each folder path
//! to the folder's place in the tree; it is rebuilt from scratch after every
//! mutation and swapped in as a whole, so lookups never see a half-updated
//! index.
//!
//! Messages in INBOX arrive through the blob store: `refresh_inbox` lists
//! new objects and adds a stub for each, whose content is only fetched when
//! something needs it. Messages in other folders are normally appended with
//! their content inline.
//!
//! UIDs are assigned from each folder's `uidnext` when a message is first
//! indexed. When a folder is deleted, its `uidnext` and UID validity are
//! retired against its path, and a folder later created at the same path
//! picks up from there with a new UID validity.
//!
//! The whole dataset serialises to JSON, which is what gets written back to
//! the blob store as the mailbox snapshot.
//!
//! This module is collectively a single abstraction, i.e., it should be
//! thought of as one large rust file. It is simply split apart because it's
//! unwieldy otherwise.

// Basic struct definitions
mod defs;
pub use defs::*;

// Internal support
mod index; // Re-indexing and path lookup
mod range; // Sequence set resolution

// Operations
mod expunge;
mod fetch;
mod flags;
mod folders; // CREATE, DELETE, RENAME, SUBSCRIBE, LIST, NAMESPACE, STATUS
mod messages; // APPEND
mod properties;
mod refresh; // Pulling new INBOX messages from the blob store
mod search;
mod snapshot; // Loading and saving the whole dataset

pub use search::{Predicate, Query};

use std::sync::Arc;

use crate::account::blob::BlobStore;
use crate::support::log_prefix::LogPrefix;
use crate::support::system_config::SystemConfig;
use crate::support::threading::ScatterGather;

impl Mailbox {
    /// Create an empty mailbox laid out as `config` describes.
    pub fn new(log_prefix: LogPrefix, config: Arc<SystemConfig>) -> Self {
        let mut this = Mailbox {
            log_prefix,
            data: Dataset::from_config(&config),
            fetcher: ScatterGather::from(&config.fetch),
            config,
            cache: Arc::default(),
            reference: String::new(),
            handlers: vec![],
            blobs: None,
        };
        this.reindex();
        this
    }

    /// Attach the blob store messages are fetched from and snapshots are
    /// written to.
    pub fn set_blob_store(&mut self, blobs: Arc<dyn BlobStore>) {
        self.blobs = Some(blobs);
    }

    /// Register a hook to be run on every message whenever the tree is
    /// indexed, starting immediately.
    pub fn add_message_handler(
        &mut self,
        handler: impl Fn(&mut Message, &str) + Send + Sync + 'static,
    ) {
        self.handlers.push(Box::new(handler));
        self.reindex();
    }

    pub fn log_prefix(&self) -> &LogPrefix {
        &self.log_prefix
    }

    pub fn dataset(&self) -> &Dataset {
        &self.data
    }
}
