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

use std::collections::HashSet;

use log::{debug, info, warn};

use super::defs::*;
use crate::support::chronox::format_internal_date;
use crate::support::error::Error;

impl Mailbox {
    /// Add a stub to INBOX for every message which has arrived in the blob
    /// store since the last refresh.
    ///
    /// Listing resumes after the last key seen, a page at a time. Keys
    /// containing the configured skip suffix are bookkeeping (such as the
    /// snapshot itself) and are ignored. Returns the number of messages
    /// added. Without a blob store, this does nothing.
    pub fn refresh_inbox(&mut self) -> Result<usize, Error> {
        let blobs = match self.blobs {
            Some(ref blobs) => blobs.clone(),
            None => return Ok(0),
        };
        let skip_suffix = &self.config.storage.skip_suffix;
        let snapshot_key = &self.config.storage.snapshot_key;
        let inbox = &mut self.data.inbox;

        let mut known = inbox
            .messages
            .iter()
            .filter_map(|m| m.key.clone())
            .collect::<HashSet<_>>();
        let mut cursor = inbox.marker.clone();
        let mut added = 0;

        loop {
            let page = blobs.list(cursor.as_deref())?;
            debug!(
                "{} Listed {} object(s) after {:?}",
                self.log_prefix,
                page.objects.len(),
                cursor
            );

            for object in page.objects {
                if object.key == *snapshot_key
                    || (!skip_suffix.is_empty()
                        && object.key.contains(skip_suffix.as_str()))
                {
                    continue;
                }

                inbox.marker = Some(object.key.clone());
                if !known.insert(object.key.clone()) {
                    continue;
                }

                inbox.messages.push(Message::stub(
                    object.key,
                    format_internal_date(&object.last_modified),
                ));
                added += 1;
            }

            match page.next_marker {
                None => break,
                Some(next) if Some(&next) == cursor.as_ref() => {
                    warn!(
                        "{} Listing did not advance past {:?}",
                        self.log_prefix, next
                    );
                    break;
                },
                Some(next) => cursor = Some(next),
            }
        }

        if added > 0 {
            info!(
                "{} Found {} new message(s) in INBOX",
                self.log_prefix, added
            );
            self.reindex();
        }
        Ok(added)
    }
}
