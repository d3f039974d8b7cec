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

use log::trace;

use super::defs::*;
use crate::account::mailbox_path::{is_inbox, join_path};
use crate::account::model::*;
use crate::support::chronox::now_internal_date;
use crate::support::error::Error;

struct IndexContext<'a> {
    cache: FolderCache,
    retired: &'a BTreeMap<String, RetiredFolder>,
    system_flags: &'a [String],
    handlers: &'a [MessageHandler],
    now: String,
}

impl Mailbox {
    /// Bring every folder and message up to date and rebuild the path cache.
    ///
    /// This fills in defaults (namespace separators, UID validity, permanent
    /// flags, UIDs, internal dates), recomputes `\HasChildren` and
    /// `\HasNoChildren`, runs the message handlers, and then replaces the
    /// cache wholesale.
    pub(super) fn reindex(&mut self) {
        let Dataset {
            ref mut inbox,
            ref mut namespaces,
            ref retired,
        } = self.data;

        let mut reference = None;
        for (prefix, ns) in namespaces.iter_mut() {
            if ns.separator.is_none() {
                ns.separator = Some(prefix.chars().last().unwrap_or('/'));
            }
            if reference.is_none() && NamespaceKind::Personal == ns.kind {
                reference = Some(prefix.clone());
            }
        }
        let reference = reference.unwrap_or_else(|| {
            namespaces.insert(
                String::new(),
                Namespace {
                    separator: Some('/'),
                    kind: NamespaceKind::Personal,
                    folders: BTreeMap::new(),
                },
            );
            String::new()
        });
        let reference_sep = namespaces
            .get(&reference)
            .map_or('/', Namespace::separator);

        let mut cx = IndexContext {
            cache: FolderCache::new(),
            retired,
            system_flags: &self.config.mailbox.system_flags,
            handlers: &self.handlers,
            now: now_internal_date(),
        };

        cx.cache.insert(
            "INBOX".to_owned(),
            FolderLoc {
                namespace: None,
                segments: vec![],
            },
        );
        process_folder(inbox, "INBOX", "INBOX", reference_sep, &cx);

        for (prefix, ns) in namespaces.iter_mut() {
            let sep = ns.separator();
            walk(&mut ns.folders, prefix, prefix, sep, &mut vec![], &mut cx);
        }

        trace!(
            "{} Indexed {} folders",
            self.log_prefix,
            cx.cache.len()
        );
        self.cache = Arc::new(cx.cache);
        self.reference = reference;
    }

    pub(super) fn locate(&self, path: &str) -> Result<&FolderLoc, Error> {
        let path = if is_inbox(path) { "INBOX" } else { path };
        self.cache.get(path).ok_or(Error::NxMailbox)
    }

    /// Look the folder at `path` up.
    pub fn folder(&self, path: &str) -> Result<&Folder, Error> {
        let loc = self.locate(path)?;
        let ns = match loc.namespace {
            None => return Ok(&self.data.inbox),
            Some(ref ns) => ns,
        };

        let mut level = &self
            .data
            .namespaces
            .get(ns)
            .ok_or(Error::NxMailbox)?
            .folders;
        let mut found = None;
        for segment in &loc.segments {
            let folder = level.get(segment).ok_or(Error::NxMailbox)?;
            level = &folder.folders;
            found = Some(folder);
        }

        found.ok_or(Error::NxMailbox)
    }

    pub(super) fn folder_mut(
        &mut self,
        path: &str,
    ) -> Result<&mut Folder, Error> {
        let loc = self.locate(path)?.clone();
        let ns = match loc.namespace {
            None => return Ok(&mut self.data.inbox),
            Some(ns) => ns,
        };

        let mut level = &mut self
            .data
            .namespaces
            .get_mut(&ns)
            .ok_or(Error::NxMailbox)?
            .folders;
        let (last, parents) =
            loc.segments.split_last().ok_or(Error::NxMailbox)?;
        for segment in parents {
            level = &mut level
                .get_mut(segment)
                .ok_or(Error::NxMailbox)?
                .folders;
        }

        level.get_mut(last).ok_or(Error::NxMailbox)
    }

    /// The prefix of the namespace used when a `LIST` reference is empty.
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Iterate the paths of all folders, INBOX included, in sorted order.
    pub fn folder_paths(&self) -> impl Iterator<Item = &str> + '_ {
        self.cache.keys().map(String::as_str)
    }
}

fn walk(
    folders: &mut BTreeMap<String, Folder>,
    parent_path: &str,
    ns_prefix: &str,
    sep: char,
    segments: &mut Vec<String>,
    cx: &mut IndexContext<'_>,
) {
    for (name, folder) in folders.iter_mut() {
        let path = join_path(parent_path, sep, name);
        segments.push(name.clone());
        cx.cache.insert(
            path.clone(),
            FolderLoc {
                namespace: Some(ns_prefix.to_owned()),
                segments: segments.clone(),
            },
        );
        process_folder(folder, &path, ns_prefix, sep, cx);
        walk(&mut folder.folders, &path, ns_prefix, sep, segments, cx);
        segments.pop();
    }
}

fn process_folder(
    folder: &mut Folder,
    path: &str,
    ns_prefix: &str,
    sep: char,
    cx: &IndexContext<'_>,
) {
    folder.path = path.to_owned();
    folder.namespace = ns_prefix.to_owned();
    folder.separator = Some(sep);

    if 0 == folder.uidvalidity {
        folder.uidvalidity = cx
            .retired
            .get(path)
            .map_or(1, |r| r.uidvalidity.saturating_add(1));
    }
    if folder.permanent_flags.is_none() {
        folder.permanent_flags = Some(cx.system_flags.to_vec());
    }

    let max_uid = folder
        .messages
        .iter()
        .filter_map(|m| m.uid)
        .map(Uid::get)
        .max()
        .unwrap_or(0);
    folder.uidnext = folder.uidnext.max(1).max(max_uid.saturating_add(1));

    set_has_children(&mut folder.flags, !folder.folders.is_empty());

    for message in &mut folder.messages {
        if message.internaldate.is_empty() {
            message.internaldate = cx.now.clone();
        }
        if message.uid.is_none() {
            message.uid = Uid::of(folder.uidnext);
            folder.uidnext = folder.uidnext.saturating_add(1);
        }
        for handler in cx.handlers {
            handler(message, path);
        }
    }
}
