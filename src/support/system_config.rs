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

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::support::error::Error;

/// The configuration for a Bucketmail installation.
///
/// This is stored in a file named `bucketmail.toml`. Every section is
/// optional.
#[derive(Clone, Debug, Deserialize, Serialize, Default)]
pub struct SystemConfig {
    /// Where messages and mailbox snapshots are kept.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Defaults applied to the folder tree.
    #[serde(default)]
    pub mailbox: MailboxConfig,

    /// Tuning for fetching message content from storage.
    ///
    /// The defaults are reasonable for most installations.
    #[serde(default)]
    pub fetch: FetchConfig,
}

impl SystemConfig {
    pub fn parse(raw: &[u8]) -> Result<Self, Error> {
        Ok(toml::from_slice(raw)?)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// The directory holding one subdirectory per bucket, used by the
    /// directory-backed blob store.
    pub blob_root: PathBuf,

    /// The bucket to use. If empty, it is derived from the user name by
    /// replacing `@` with `--` and appending `bucket_suffix`.
    pub bucket: String,

    /// See `bucket`.
    pub bucket_suffix: String,

    /// The key under which the mailbox snapshot is stored in the bucket.
    pub snapshot_key: String,

    /// The maximum number of objects returned by one listing request.
    pub page_size: usize,

    /// Objects whose key contains this string are bookkeeping and never
    /// treated as messages when refreshing INBOX.
    pub skip_suffix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            blob_root: PathBuf::from("blobs"),
            bucket: String::new(),
            bucket_suffix: ".ses.inbound".to_owned(),
            snapshot_key: "mbox.json".to_owned(),
            page_size: 1000,
            skip_suffix: ".json".to_owned(),
        }
    }
}

impl StorageConfig {
    /// Return the bucket that holds `user`'s mail.
    pub fn bucket_for(&self, user: &str) -> String {
        if self.bucket.is_empty() {
            format!("{}{}", user.replace('@', "--"), self.bucket_suffix)
        } else {
            self.bucket.clone()
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct MailboxConfig {
    /// The flags every folder accepts by default.
    pub system_flags: Vec<String>,

    /// The namespaces present in a freshly created mailbox.
    ///
    /// If no personal namespace is listed, one with an empty prefix and `/`
    /// as the separator is added automatically.
    pub namespaces: Vec<NamespaceConfig>,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        MailboxConfig {
            system_flags: vec![
                "\\Answered".to_owned(),
                "\\Flagged".to_owned(),
                "\\Draft".to_owned(),
                "\\Deleted".to_owned(),
                "\\Seen".to_owned(),
            ],
            namespaces: vec![NamespaceConfig::default()],
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct NamespaceConfig {
    /// The prefix all folders in the namespace share, including the trailing
    /// separator, e.g. `"Shared/"`. Empty for the default namespace.
    #[serde(default)]
    pub prefix: String,
    /// If unset, the last character of `prefix`, or `/` if that is empty.
    #[serde(default)]
    pub separator: Option<char>,
    /// One of `personal`, `other`, or `shared`.
    #[serde(default)]
    pub kind: Option<String>,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Messages fetched between checks on whether to add more threads.
    pub batch_size: usize,
    /// Milliseconds a fetch may run before it spreads onto more threads.
    pub escalate_ms: u64,
    /// Fetch requests queued ahead of the worker threads.
    pub buffer_size: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            batch_size: 4,
            escalate_ms: 50,
            buffer_size: 64,
        }
    }
}
