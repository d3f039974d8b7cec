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

use log::debug;

use super::defs::*;
use super::range::resolve_nonempty;
use crate::account::model::*;
use crate::support::error::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FlagOp {
    Add,
    Remove,
    Replace,
}

impl Mailbox {
    /// Add `flags` to the messages `range` selects in the folder at `path`.
    ///
    /// Flags the folder does not accept are skipped, as are flags a message
    /// already has.
    pub fn add_flags(
        &mut self,
        path: &str,
        range: &str,
        mode: RangeMode,
        flags: &[String],
    ) -> Result<Vec<FlagUpdate>, Error> {
        self.edit_flags(path, range, mode, flags, FlagOp::Add)
    }

    /// Remove `flags` from the selected messages.
    ///
    /// Only the first occurrence of each flag is removed, so duplicated
    /// flags in stored data survive one removal.
    pub fn remove_flags(
        &mut self,
        path: &str,
        range: &str,
        mode: RangeMode,
        flags: &[String],
    ) -> Result<Vec<FlagUpdate>, Error> {
        self.edit_flags(path, range, mode, flags, FlagOp::Remove)
    }

    /// Set the flags of the selected messages to exactly the accepted
    /// members of `flags`.
    pub fn replace_flags(
        &mut self,
        path: &str,
        range: &str,
        mode: RangeMode,
        flags: &[String],
    ) -> Result<Vec<FlagUpdate>, Error> {
        self.edit_flags(path, range, mode, flags, FlagOp::Replace)
    }

    fn edit_flags(
        &mut self,
        path: &str,
        range: &str,
        mode: RangeMode,
        flags: &[String],
        op: FlagOp,
    ) -> Result<Vec<FlagUpdate>, Error> {
        let folder = self.folder_mut(path)?;
        let ixs = resolve_nonempty(&folder.messages, range, mode)?;

        let accepted = flags
            .iter()
            .filter(|f| FlagOp::Remove == op || folder.accepts_flag(f))
            .cloned()
            .collect::<Vec<_>>();

        let mut updates = Vec::with_capacity(ixs.len());
        for ix in ixs {
            let message = &mut folder.messages[ix];
            match op {
                FlagOp::Add => {
                    for flag in &accepted {
                        ensure_flag(&mut message.flags, flag);
                    }
                },
                FlagOp::Remove => {
                    for flag in &accepted {
                        if let Some(pos) =
                            message.flags.iter().position(|f| f == flag)
                        {
                            message.flags.remove(pos);
                        }
                    }
                },
                FlagOp::Replace => {
                    message.flags.clear();
                    for flag in &accepted {
                        ensure_flag(&mut message.flags, flag);
                    }
                },
            }

            updates.push(FlagUpdate {
                index: Seqnum::from_index(ix),
                uid: message.uid(),
                flags: message.flags.clone(),
            });
        }

        debug!(
            "{} {:?} flags {:?} on {} message(s) in {}",
            self.log_prefix,
            op,
            accepted,
            updates.len(),
            path
        );
        self.reindex();
        Ok(updates)
    }
}

#[cfg(test)]
mod test {
    use super::super::test_prelude::*;

    fn set_up_three() -> Mailbox {
        let mut mb = set_up();
        for _ in 0..3 {
            simple_append(&mut mb, "INBOX");
        }
        mb
    }

    #[test]
    fn add_is_idempotent() {
        let mut mb = set_up_three();
        let updates = mb
            .add_flags("INBOX", "1:2", RangeMode::Index, &flags(&["\\Seen"]))
            .unwrap();
        assert_eq!(
            vec![
                FlagUpdate {
                    index: Seqnum::u(1),
                    uid: Uid::u(1),
                    flags: flags(&["\\Seen"]),
                },
                FlagUpdate {
                    index: Seqnum::u(2),
                    uid: Uid::u(2),
                    flags: flags(&["\\Seen"]),
                },
            ],
            updates
        );

        let updates = mb
            .add_flags(
                "INBOX",
                "2",
                RangeMode::Uid,
                &flags(&["\\Seen", "\\Flagged"]),
            )
            .unwrap();
        assert_eq!(flags(&["\\Seen", "\\Flagged"]), updates[0].flags);
    }

    #[test]
    fn remove_first_occurrence() {
        let mut mb = set_up_three();
        mb.folder_mut("INBOX").unwrap().messages[0].flags =
            flags(&["\\Seen", "$Junk", "\\Seen"]);

        let updates = mb
            .remove_flags("INBOX", "1", RangeMode::Index, &flags(&["\\Seen"]))
            .unwrap();
        assert_eq!(flags(&["$Junk", "\\Seen"]), updates[0].flags);
    }

    #[test]
    fn replace_dedups() {
        let mut mb = set_up_three();
        mb.add_flags("INBOX", "*", RangeMode::Index, &flags(&["\\Draft"]))
            .unwrap();
        let updates = mb
            .replace_flags(
                "INBOX",
                "3",
                RangeMode::Index,
                &flags(&["\\Seen", "\\Answered", "\\Seen"]),
            )
            .unwrap();
        assert_eq!(flags(&["\\Seen", "\\Answered"]), updates[0].flags);
    }

    #[test]
    fn unaccepted_flags_are_skipped() {
        let mut mb = set_up_three();
        mb.folder_mut("INBOX").unwrap().allow_permanent_flags = false;

        let updates = mb
            .add_flags(
                "INBOX",
                "1",
                RangeMode::Index,
                &flags(&["\\Seen", "$Custom"]),
            )
            .unwrap();
        assert_eq!(flags(&["\\Seen"]), updates[0].flags);

        let updates = mb
            .replace_flags("INBOX", "1", RangeMode::Index, &flags(&["$Custom"]))
            .unwrap();
        assert!(updates[0].flags.is_empty());

        mb.folder_mut("INBOX").unwrap().messages[1].flags =
            flags(&["$Custom"]);
        let updates = mb
            .remove_flags("INBOX", "2", RangeMode::Index, &flags(&["$Custom"]))
            .unwrap();
        assert!(updates[0].flags.is_empty());
    }

    #[test]
    fn empty_range_is_an_error() {
        let mut mb = set_up_three();
        assert_matches!(
            Err(Error::NxMessage),
            mb.add_flags("INBOX", "7", RangeMode::Index, &flags(&["\\Seen"]))
        );
        assert_matches!(
            Err(Error::NxMailbox),
            mb.add_flags("nx", "1", RangeMode::Index, &flags(&["\\Seen"]))
        );
    }
}
