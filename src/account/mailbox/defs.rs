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
use std::fmt;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use crate::account::blob::BlobStore;
use crate::account::model::*;
use crate::mime::model::ParsedMessage;
use crate::mime::parser;
use crate::support::log_prefix::LogPrefix;
use crate::support::system_config::SystemConfig;
use crate::support::threading::ScatterGather;

/// A single message in a folder.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    /// The key of the object holding the raw message, if it lives in the
    /// blob store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Assigned from the folder's `uidnext` on indexing if absent.
    pub uid: Option<Uid>,
    /// Assigned the current time on indexing if empty.
    pub internaldate: String,
    pub flags: Vec<String>,
    pub properties: BTreeMap<String, Property>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "raw_as_text"
    )]
    raw: Option<Vec<u8>>,
    #[serde(skip)]
    parsed: OnceLock<ParsedMessage>,
}

impl Message {
    pub fn new(raw: Vec<u8>) -> Self {
        Message {
            raw: Some(raw),
            ..Message::default()
        }
    }

    /// A message whose content still has to be fetched from `key`.
    pub fn stub(key: String, internaldate: String) -> Self {
        Message {
            key: Some(key),
            internaldate,
            ..Message::default()
        }
    }

    pub fn raw(&self) -> Option<&[u8]> {
        self.raw.as_deref()
    }

    /// Replace the raw content, discarding any parse of the old content.
    pub fn set_raw(&mut self, raw: Vec<u8>) {
        self.raw = Some(raw);
        self.parsed = OnceLock::new();
    }

    /// Drop the raw content of a message that can be fetched again.
    pub(super) fn forget_content(&mut self) {
        if self.key.is_some() {
            self.raw = None;
            self.parsed = OnceLock::new();
        }
    }

    /// Return the parsed form of the message, parsing it on first use.
    ///
    /// A message without content parses as an empty message.
    pub fn parsed(&self) -> &ParsedMessage {
        self.parsed
            .get_or_init(|| parser::parse(self.raw.as_deref().unwrap_or(&[])))
    }

    /// The size of the raw message in bytes.
    pub fn size(&self) -> usize {
        self.raw.as_ref().map_or(0, Vec::len)
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }

    /// The UID, which is always set once the message has been indexed.
    pub fn uid(&self) -> Uid {
        self.uid.unwrap_or(Uid::MIN)
    }
}

mod raw_as_text {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::mime::parser::decode;

    pub fn serialize<S: Serializer>(
        raw: &Option<Vec<u8>>,
        ser: S,
    ) -> Result<S::Ok, S::Error> {
        match *raw {
            Some(ref raw) => ser.serialize_str(&decode(raw)),
            None => ser.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        de: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        Ok(Option::<String>::deserialize(de)?.map(String::into_bytes))
    }
}

fn yes() -> bool {
    true
}

/// A folder, possibly with child folders.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    /// The full path, maintained by indexing.
    #[serde(default)]
    pub path: String,
    /// The prefix of the namespace containing the folder, or `INBOX` for
    /// the inbox. Maintained by indexing.
    #[serde(default)]
    pub namespace: String,
    /// Maintained by indexing.
    #[serde(default)]
    pub separator: Option<char>,
    /// Zero until indexing assigns one.
    #[serde(default)]
    pub uidvalidity: u32,
    #[serde(default)]
    pub uidnext: u32,
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub permanent_flags: Option<Vec<String>>,
    /// Whether flags outside `permanent_flags` may be set on messages.
    #[serde(default = "yes")]
    pub allow_permanent_flags: bool,
    #[serde(default = "yes")]
    pub subscribed: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub special_use: Vec<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub folders: BTreeMap<String, Folder>,
    /// For INBOX, the key after which to continue listing new messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
}

impl Default for Folder {
    fn default() -> Self {
        Folder {
            path: String::new(),
            namespace: String::new(),
            separator: None,
            uidvalidity: 0,
            uidnext: 0,
            flags: vec![],
            permanent_flags: None,
            allow_permanent_flags: true,
            subscribed: true,
            special_use: vec![],
            messages: vec![],
            folders: BTreeMap::new(),
            marker: None,
        }
    }
}

impl Folder {
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }

    pub fn is_selectable(&self) -> bool {
        !MailboxAttribute::Noselect.is_in(&self.flags)
    }

    /// The final part of the path.
    pub fn name(&self) -> &str {
        match self.separator {
            Some(sep) => {
                let path = self
                    .path
                    .strip_prefix(self.namespace.as_str())
                    .filter(|rest| !rest.is_empty())
                    .unwrap_or(&self.path);
                path.rsplit(sep).next().unwrap_or(path)
            },
            None => &self.path,
        }
    }

    /// Whether `flag` may be set on messages in this folder.
    pub fn accepts_flag(&self, flag: &str) -> bool {
        self.allow_permanent_flags
            || self
                .permanent_flags
                .as_ref()
                .map_or(false, |p| p.iter().any(|f| f == flag))
    }
}

/// A namespace: a root of the folder tree other than INBOX.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Namespace {
    /// If absent, the last character of the prefix, or `/`.
    #[serde(default)]
    pub separator: Option<char>,
    #[serde(default, rename = "type")]
    pub kind: NamespaceKind,
    #[serde(default)]
    pub folders: BTreeMap<String, Folder>,
}

impl Namespace {
    pub fn separator(&self) -> char {
        self.separator.unwrap_or('/')
    }
}

/// What remains of a deleted folder, so a folder later created at the same
/// path never reuses its UIDs.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RetiredFolder {
    pub uidnext: u32,
    pub uidvalidity: u32,
}

/// All data in one user's mailbox, as persisted in a snapshot.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(rename = "INBOX", default)]
    pub inbox: Folder,
    /// Keyed by namespace prefix.
    #[serde(default)]
    pub namespaces: BTreeMap<String, Namespace>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub retired: BTreeMap<String, RetiredFolder>,
}

impl Dataset {
    /// An empty dataset with the namespaces `config` lists.
    pub fn from_config(config: &SystemConfig) -> Self {
        let mut this = Dataset::default();
        for ns in &config.mailbox.namespaces {
            let kind = match ns.kind.as_deref() {
                Some("other") => NamespaceKind::Other,
                Some("shared") => NamespaceKind::Shared,
                _ => NamespaceKind::Personal,
            };
            this.namespaces.insert(
                ns.prefix.clone(),
                Namespace {
                    separator: ns.separator,
                    kind,
                    folders: BTreeMap::new(),
                },
            );
        }
        this
    }
}

/// Where a folder lives in the tree.
#[derive(Clone, Debug)]
pub(super) struct FolderLoc {
    /// `None` for INBOX.
    pub(super) namespace: Option<String>,
    /// The names of the folder and its ancestors, outermost first.
    pub(super) segments: Vec<String>,
}

/// Maps every folder path to its location in the tree.
pub(super) type FolderCache = BTreeMap<String, FolderLoc>;

/// Hook run on every message each time the tree is indexed.
///
/// It is passed the message and the path of its folder.
pub type MessageHandler = Box<dyn Fn(&mut Message, &str) + Send + Sync>;

/// The mail store of one user.
///
/// All mutations go through `&mut self` and end by re-indexing, which
/// rebuilds the path cache and publishes it as a whole.
pub struct Mailbox {
    pub(super) log_prefix: LogPrefix,
    pub(super) config: Arc<SystemConfig>,
    pub(super) data: Dataset,
    pub(super) cache: Arc<FolderCache>,
    /// Prefix of the first personal namespace.
    pub(super) reference: String,
    pub(super) handlers: Vec<MessageHandler>,
    pub(super) blobs: Option<Arc<dyn BlobStore>>,
    pub(super) fetcher: ScatterGather,
}

impl fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Mailbox")
            .field("log_prefix", &self.log_prefix)
            .field("reference", &self.reference)
            .field("folders", &self.cache.len())
            .finish()
    }
}

/// A message selected by a sequence set.
#[derive(Clone, Copy, Debug)]
pub struct Hit<'a> {
    pub index: Seqnum,
    pub message: &'a Message,
}

/// One message matched by a search.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub uid: Uid,
    pub index: Seqnum,
}

/// The flags of a message after a flag operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FlagUpdate {
    pub index: Seqnum,
    pub uid: Uid,
    pub flags: Vec<String>,
}

/// The properties of a message after a property operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PropertyUpdate {
    pub index: Seqnum,
    pub uid: Uid,
    pub properties: BTreeMap<String, Property>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct AppendResult {
    pub uid: Uid,
    /// The number of messages in the folder afterwards.
    pub exists: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExpungeResult {
    /// The position of each removed message at the time it was removed, so
    /// that reporting them in order keeps a client's numbering in sync.
    pub expunged: Vec<Seqnum>,
    /// The number of messages remaining.
    pub exists: usize,
}

/// Summary information about a folder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderStatus {
    pub name: String,
    pub path: String,
    pub flags: Vec<String>,
    pub special_use: Vec<String>,
    pub permanent_flags: Vec<String>,
    pub uidvalidity: u32,
    pub uidnext: u32,
    pub messages: usize,
    pub seen: usize,
    pub unseen: usize,
    pub subscribed: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NamespaceEntry {
    pub name: String,
    pub separator: char,
}

/// The namespaces of a mailbox, grouped by kind.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct NamespaceListing {
    pub personal: Vec<NamespaceEntry>,
    pub other: Vec<NamespaceEntry>,
    pub shared: Vec<NamespaceEntry>,
}
