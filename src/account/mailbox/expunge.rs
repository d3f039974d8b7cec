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
use crate::account::model::*;
use crate::support::error::Error;

impl Mailbox {
    /// Remove every message flagged `\Deleted` from the folder at `path`.
    ///
    /// The position reported for each removed message accounts for the
    /// removals before it, matching the order a client processes `EXPUNGE`
    /// responses in. E.g., removing the last two of three messages reports
    /// positions 2 and 2.
    pub fn expunge(&mut self, path: &str) -> Result<ExpungeResult, Error> {
        let folder = self.folder_mut(path)?;

        let mut expunged = vec![];
        let mut ix = 0;
        while ix < folder.messages.len() {
            if folder.messages[ix].has_flag(flags::DELETED) {
                folder.messages.remove(ix);
                expunged.push(Seqnum::from_index(ix));
            } else {
                ix += 1;
            }
        }

        let exists = folder.messages.len();
        if !expunged.is_empty() {
            info!(
                "{} Expunged {} message(s) from {}",
                self.log_prefix,
                expunged.len(),
                path
            );
        }

        self.reindex();
        Ok(ExpungeResult { expunged, exists })
    }
}

#[cfg(test)]
mod test {
    use super::super::test_prelude::*;

    #[test]
    fn positions_account_for_earlier_removals() {
        let mut mb = set_up();
        for _ in 0..5 {
            simple_append(&mut mb, "INBOX");
        }
        mb.add_flags("INBOX", "1,3:4", RangeMode::Index, &flags(&["\\Deleted"]))
            .unwrap();

        let result = mb.expunge("INBOX").unwrap();
        assert_eq!(
            vec![Seqnum::u(1), Seqnum::u(2), Seqnum::u(2)],
            result.expunged
        );
        assert_eq!(2, result.exists);

        let remaining = mb
            .folder("INBOX")
            .unwrap()
            .messages
            .iter()
            .map(|m| m.uid().get())
            .collect::<Vec<_>>();
        assert_eq!(vec![2, 5], remaining);
    }

    #[test]
    fn uids_not_reused_after_expunge() {
        let mut mb = set_up();
        simple_append(&mut mb, "INBOX");
        simple_append(&mut mb, "INBOX");
        mb.add_flags("INBOX", "*", RangeMode::Uid, &flags(&["\\Deleted"]))
            .unwrap();
        assert_eq!(vec![Seqnum::u(2)], mb.expunge("INBOX").unwrap().expunged);
        assert_eq!(3, simple_append(&mut mb, "INBOX").get());
    }

    #[test]
    fn nothing_to_expunge() {
        let mut mb = set_up();
        simple_append(&mut mb, "INBOX");
        let result = mb.expunge("INBOX").unwrap();
        assert!(result.expunged.is_empty());
        assert_eq!(1, result.exists);
        assert_matches!(Err(Error::NxMailbox), mb.expunge("nx"));
    }
}
