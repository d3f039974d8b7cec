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

use log::info;

use super::defs::*;
use crate::account::mailbox_path::*;
use crate::account::model::*;
use crate::support::error::Error;

impl Mailbox {
    /// Find the namespace `path` falls under, checking that folders may be
    /// made there.
    ///
    /// The longest namespace prefix `path` starts with wins; otherwise it
    /// belongs to the namespace with the empty prefix.
    fn writable_namespace(&self, path: &str) -> Result<(String, char), Error> {
        let mut found = "";
        for (prefix, ns) in &self.data.namespaces {
            if prefix.is_empty() {
                continue;
            }

            let bare = prefix
                .strip_suffix(ns.separator())
                .unwrap_or(prefix.as_str());
            if path == bare || path == prefix {
                return Err(Error::NamespaceName);
            }

            if path.starts_with(prefix.as_str()) && prefix.len() > found.len()
            {
                found = prefix;
            }
        }

        let ns = self
            .data
            .namespaces
            .get(found)
            .ok_or(Error::UnknownNamespace)?;
        if NamespaceKind::Personal != ns.kind {
            return Err(Error::NamespacePermission);
        }

        Ok((found.to_owned(), ns.separator()))
    }

    /// Create the folder at `path`, along with any missing ancestors.
    ///
    /// A trailing separator is ignored. Creating over a `\Noselect`
    /// placeholder makes it selectable again. Newly created folders start
    /// unsubscribed.
    pub fn create_folder(&mut self, path: &str) -> Result<(), Error> {
        if is_inbox(path) {
            return Err(Error::MailboxExists);
        }

        let (prefix, sep) = self.writable_namespace(path)?;
        let path = path.strip_suffix(sep).unwrap_or(path);

        if let Ok(existing) = self.folder(path) {
            if existing.is_selectable() {
                return Err(Error::MailboxExists);
            }
        }

        let segments = parse_folder_path(&path[prefix.len()..], sep)
            .map(str::to_owned)
            .collect::<Vec<_>>();
        if segments.is_empty() {
            return Err(Error::NamespaceName);
        }

        // Check everything before changing anything
        let mut paths = Vec::with_capacity(segments.len());
        let mut cur_path = prefix.clone();
        for segment in &segments {
            cur_path = join_path(&cur_path, sep, segment);
            if let Ok(loc) = self.locate(&cur_path) {
                if loc.namespace.is_none() {
                    return Err(Error::Noinferiors("INBOX".to_owned()));
                }
                if MailboxAttribute::Noinferiors
                    .is_in(&self.folder(&cur_path)?.flags)
                {
                    return Err(Error::Noinferiors(cur_path));
                }
            }
            paths.push(cur_path.clone());
        }

        let log_prefix = &self.log_prefix;
        let Dataset {
            ref mut namespaces,
            ref mut retired,
            ..
        } = self.data;
        let mut level = &mut namespaces
            .get_mut(&prefix)
            .ok_or(Error::UnknownNamespace)?
            .folders;
        let last = segments.len() - 1;
        for (ix, (segment, cur_path)) in
            segments.iter().zip(&paths).enumerate()
        {
            let folder = level.entry(segment.clone()).or_insert_with(|| {
                let mut folder = Folder {
                    subscribed: false,
                    ..Folder::default()
                };
                if let Some(r) = retired.remove(cur_path) {
                    folder.uidnext = r.uidnext;
                    folder.uidvalidity = r.uidvalidity.saturating_add(1);
                }
                info!("{} Created folder {}", log_prefix, cur_path);
                folder
            });

            if ix == last && !folder.is_selectable() {
                remove_flag(
                    &mut folder.flags,
                    MailboxAttribute::Noselect.name(),
                );
                folder.uidvalidity = folder.uidvalidity.saturating_add(1);
                info!(
                    "{} Recreated placeholder folder {}",
                    log_prefix, cur_path
                );
            }

            level = &mut folder.folders;
        }

        self.reindex();
        Ok(())
    }

    /// Delete the folder at `path` along with everything beneath it.
    ///
    /// The UID state of every removed folder is retired. A `\Noselect`
    /// parent left without children is removed as well.
    pub fn delete_folder(&mut self, path: &str) -> Result<(), Error> {
        if is_inbox(path) {
            return Err(Error::BadOperationOnInbox);
        }

        let (_, sep) = self.writable_namespace(path)?;
        let path = path.strip_suffix(sep).unwrap_or(path);

        let folder = self.folder(path)?;
        if !folder.is_selectable() && !folder.folders.is_empty() {
            return Err(Error::NxMailbox);
        }

        let loc = self.locate(path)?.clone();
        let (name, parents) =
            loc.segments.split_last().ok_or(Error::NxMailbox)?;
        let ns_prefix = loc.namespace.ok_or(Error::BadOperationOnInbox)?;
        let mut level = &mut self
            .data
            .namespaces
            .get_mut(&ns_prefix)
            .ok_or(Error::NxMailbox)?
            .folders;
        for segment in parents {
            level = &mut level
                .get_mut(segment)
                .ok_or(Error::NxMailbox)?
                .folders;
        }
        if let Some(removed) = level.remove(name) {
            retire_subtree(&removed, &mut self.data.retired);
        }
        info!("{} Deleted folder {}", self.log_prefix, path);
        self.reindex();

        if !parents.is_empty() {
            if let Some(parent_path) = parent_path(path, sep) {
                let parent = self.folder(parent_path)?;
                if !parent.is_selectable() && parent.folders.is_empty() {
                    let parent_path = parent_path.to_owned();
                    self.delete_folder(&parent_path)?;
                }
            }
        }

        Ok(())
    }

    /// Move the folder at `src`, with its messages and children, to `dst`.
    pub fn rename_folder(&mut self, src: &str, dst: &str) -> Result<(), Error> {
        if is_inbox(src) {
            return Err(Error::BadOperationOnInbox);
        }

        let src_folder = self.folder(src)?;
        let src = src_folder.path.clone();
        let sep = src_folder.separator.unwrap_or('/');
        let dst = dst.strip_suffix(sep).unwrap_or(dst);
        if dst == src
            || dst
                .strip_prefix(src.as_str())
                .map_or(false, |rest| rest.starts_with(sep))
        {
            return Err(Error::RenameIntoSelf);
        }

        // Both ends must be writable before anything moves
        self.writable_namespace(&src)?;
        self.writable_namespace(dst)?;
        self.create_folder(dst)?;

        let moved = {
            let src_folder = self.folder_mut(&src)?;
            Folder {
                messages: std::mem::take(&mut src_folder.messages),
                folders: std::mem::take(&mut src_folder.folders),
                ..src_folder.clone()
            }
        };
        // The source is now childless, so it goes away completely
        self.reindex();
        if let Err(e) = self.delete_folder(&src) {
            if let Ok(src_folder) = self.folder_mut(&src) {
                src_folder.messages = moved.messages;
                src_folder.folders = moved.folders;
            }
            let _ = self.delete_folder(dst);
            self.reindex();
            return Err(e);
        }

        let dst_folder = self.folder_mut(dst)?;
        dst_folder.uidnext = dst_folder.uidnext.max(moved.uidnext);
        dst_folder.uidvalidity = dst_folder.uidvalidity.max(moved.uidvalidity);
        dst_folder.flags = moved.flags;
        dst_folder.permanent_flags = moved.permanent_flags;
        dst_folder.allow_permanent_flags = moved.allow_permanent_flags;
        dst_folder.subscribed = moved.subscribed;
        dst_folder.special_use = moved.special_use;
        dst_folder.messages = moved.messages;
        dst_folder.folders = moved.folders;

        info!("{} Renamed folder {} to {}", self.log_prefix, src, dst);
        self.reindex();
        Ok(())
    }

    pub fn subscribe(&mut self, path: &str) -> Result<(), Error> {
        let folder = self.folder_mut(path)?;
        if !folder.is_selectable() {
            return Err(Error::MailboxUnselectable);
        }
        folder.subscribed = true;
        Ok(())
    }

    pub fn unsubscribe(&mut self, path: &str) -> Result<(), Error> {
        self.folder_mut(path)?.subscribed = false;
        Ok(())
    }

    /// Replace the special-use attributes of the folder at `path`.
    pub fn set_special_use(
        &mut self,
        path: &str,
        attributes: Vec<String>,
    ) -> Result<(), Error> {
        self.folder_mut(path)?.special_use = attributes;
        Ok(())
    }

    /// Return summary information about the folder at `path`.
    pub fn folder_status(&self, path: &str) -> Result<FolderStatus, Error> {
        let folder = self.folder(path)?;
        let seen = folder
            .messages
            .iter()
            .filter(|m| m.has_flag(flags::SEEN))
            .count();

        Ok(FolderStatus {
            name: folder.name().to_owned(),
            path: folder.path.clone(),
            flags: folder.flags.clone(),
            special_use: folder.special_use.clone(),
            permanent_flags: folder.permanent_flags.clone().unwrap_or_default(),
            uidvalidity: folder.uidvalidity,
            uidnext: folder.uidnext,
            messages: folder.messages.len(),
            seen,
            unseen: folder.messages.len() - seen,
            subscribed: folder.subscribed,
        })
    }

    /// List the folders matching the RFC 3501 pattern `pattern` relative to
    /// the namespace `reference`.
    ///
    /// An empty reference means the first personal namespace, and also lets
    /// INBOX match. Folders marked `\NonExistent` are only returned when
    /// named exactly.
    pub fn list_folders(&self, reference: &str, pattern: &str) -> Vec<&Folder> {
        let (reference, include_inbox) = if reference.is_empty() {
            (self.reference.as_str(), true)
        } else {
            (reference, false)
        };

        let ns = match self.data.namespaces.get(reference) {
            Some(ns) => ns,
            None => return vec![],
        };
        let sep = ns.separator();
        let matcher =
            folder_path_matcher(&format!("{}{}", reference, pattern), sep);

        let mut found = vec![];
        if include_inbox {
            let inbox_path = if reference.is_empty() {
                "INBOX".to_owned()
            } else {
                join_path(reference, sep, "INBOX")
            };
            if matcher(&inbox_path) {
                found.push(&self.data.inbox);
            }
        }

        for path in self.cache.keys() {
            if !matcher(path) {
                continue;
            }

            let folder = match self.folder(path) {
                Ok(folder) => folder,
                Err(_) => continue,
            };
            if folder.namespace != reference {
                continue;
            }
            if MailboxAttribute::NonExistent.is_in(&folder.flags)
                && folder.path != pattern
            {
                continue;
            }

            found.push(folder);
        }

        found
    }

    /// Return the namespaces grouped by kind.
    pub fn namespaces(&self) -> NamespaceListing {
        let mut listing = NamespaceListing::default();
        for (prefix, ns) in &self.data.namespaces {
            let entry = NamespaceEntry {
                name: prefix.clone(),
                separator: ns.separator(),
            };
            match ns.kind {
                NamespaceKind::Personal => listing.personal.push(entry),
                NamespaceKind::Other => listing.other.push(entry),
                NamespaceKind::Shared => listing.shared.push(entry),
            }
        }
        listing
    }

    /// Return the namespace with the given prefix, or the reference
    /// namespace if `None`.
    pub fn namespace(&self, prefix: Option<&str>) -> Option<&Namespace> {
        self.data
            .namespaces
            .get(prefix.unwrap_or(self.reference.as_str()))
    }
}

fn retire_subtree(
    folder: &Folder,
    retired: &mut BTreeMap<String, RetiredFolder>,
) {
    retired.insert(
        folder.path.clone(),
        RetiredFolder {
            uidnext: folder.uidnext,
            uidvalidity: folder.uidvalidity,
        },
    );
    for child in folder.folders.values() {
        retire_subtree(child, retired);
    }
}
