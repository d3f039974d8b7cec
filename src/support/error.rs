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

use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("No such folder")]
    NxMailbox,
    #[error("Folder already exists")]
    MailboxExists,
    #[error("Folder is not selectable")]
    MailboxUnselectable,
    #[error("Folder name is a namespace value")]
    NamespaceName,
    #[error("Unknown namespace")]
    UnknownNamespace,
    #[error("Permission denied in namespace")]
    NamespacePermission,
    #[error("Operation not allowed on INBOX")]
    BadOperationOnInbox,
    #[error("Can not create subfolders for {0}")]
    Noinferiors(String),
    #[error("Folder can not be renamed into itself")]
    RenameIntoSelf,
    #[error("No messages matched the sequence set")]
    NxMessage,
    #[error("Unknown search key: {0}")]
    BadSearchKey(String),
    #[error("Bad search value for {0}")]
    BadSearchValue(String),
    #[error("No object stored under {0}")]
    BlobNotFound(String),
    #[error("Blob store failure: {0}")]
    BlobStore(String),
    #[error("Failed to fetch {failed} message(s); first failure: {first}")]
    BlobFetch { failed: usize, first: String },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether this error indicates the query itself was bad, rather than
    /// some problem with the data it was run against.
    pub fn is_invalid_query(&self) -> bool {
        matches!(*self, Error::BadSearchKey(..) | Error::BadSearchValue(..))
    }
}
