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

use log::info;

use super::defs::*;
use crate::support::error::Error;

impl Mailbox {
    /// Append a message to the folder at `path`.
    ///
    /// If `internaldate` is `None`, the current time is used. Returns the
    /// UID assigned to the message and the new message count.
    pub fn append(
        &mut self,
        path: &str,
        raw: Vec<u8>,
        flags: Vec<String>,
        internaldate: Option<String>,
    ) -> Result<AppendResult, Error> {
        let folder = self.folder_mut(path)?;
        if !folder.is_selectable() {
            return Err(Error::MailboxUnselectable);
        }

        let mut message = Message::new(raw);
        message.flags = flags;
        message.internaldate = internaldate.unwrap_or_default();
        folder.messages.push(message);
        let path = folder.path.clone();

        self.reindex();

        let folder = self.folder(&path)?;
        let uid = folder
            .messages
            .last()
            .map(Message::uid)
            .ok_or(Error::NxMessage)?;
        info!(
            "{} Appended UID {} to {} ({} bytes)",
            self.log_prefix,
            uid,
            path,
            folder.messages.last().map_or(0, Message::size)
        );

        Ok(AppendResult {
            uid,
            exists: folder.messages.len(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::super::test_prelude::*;

    #[test]
    fn uids_are_assigned_in_order() {
        let mut mb = set_up();
        let first = mb
            .append("INBOX", b"one".to_vec(), vec![], None)
            .unwrap();
        assert_eq!(Uid::u(1), first.uid);
        assert_eq!(1, first.exists);

        let second = mb
            .append(
                "inbox",
                b"two".to_vec(),
                flags(&["\\Seen"]),
                Some("01-Jan-2024 00:00:00 +0000".to_owned()),
            )
            .unwrap();
        assert_eq!(Uid::u(2), second.uid);
        assert_eq!(2, second.exists);

        let inbox = mb.folder("INBOX").unwrap();
        assert_eq!(3, inbox.uidnext);
        assert_eq!("01-Jan-2024 00:00:00 +0000", inbox.messages[1].internaldate);
        assert!(!inbox.messages[0].internaldate.is_empty());
        assert!(inbox.messages[1].has_flag("\\Seen"));
        assert_eq!(Some(&b"two"[..]), inbox.messages[1].raw());
    }

    #[test]
    fn append_to_missing_or_placeholder() {
        let mut mb = set_up();
        assert_matches!(
            Err(Error::NxMailbox),
            mb.append("nx", vec![], vec![], None)
        );

        mb.create_folder("a/b").unwrap();
        ensure_flag(
            &mut mb.folder_mut("a").unwrap().flags,
            MailboxAttribute::Noselect.name(),
        );
        assert_matches!(
            Err(Error::MailboxUnselectable),
            mb.append("a", vec![], vec![], None)
        );
    }

    #[test]
    fn handlers_run_on_index() {
        let mut mb = set_up();
        simple_append(&mut mb, "INBOX");
        mb.add_message_handler(|message, path| {
            message
                .properties
                .insert("folder".to_owned(), Property::Single(path.to_owned()));
        });
        simple_append(&mut mb, "INBOX");

        for message in &mb.folder("INBOX").unwrap().messages {
            assert_eq!(
                Some(&Property::Single("INBOX".to_owned())),
                message.properties.get("folder")
            );
        }
    }
}
