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

use super::defs::*;
use crate::account::model::*;
use crate::support::error::Error;

/// Return the indices of the messages in `messages` which `range` selects.
///
/// In `RangeMode::Uid`, `*` stands for the largest UID present; otherwise
/// for the message count. Indices are returned in folder order.
pub(super) fn resolve(
    messages: &[Message],
    range: &str,
    mode: RangeMode,
) -> Vec<usize> {
    match mode {
        RangeMode::Index => {
            let count = messages.len() as u32;
            SeqRange::<Seqnum>::parse(range, count)
                .items(count)
                .map(Seqnum::to_index)
                .collect()
        },
        RangeMode::Uid => {
            let max_uid =
                messages.iter().map(|m| m.uid().get()).max().unwrap_or(0);
            let set = SeqRange::<Uid>::parse(range, max_uid);
            messages
                .iter()
                .enumerate()
                .filter(|&(_, m)| set.contains(m.uid()))
                .map(|(ix, _)| ix)
                .collect()
        },
    }
}

/// Like `resolve`, but fails with `Error::NxMessage` if nothing matches.
pub(super) fn resolve_nonempty(
    messages: &[Message],
    range: &str,
    mode: RangeMode,
) -> Result<Vec<usize>, Error> {
    let ixs = resolve(messages, range, mode);
    if ixs.is_empty() {
        Err(Error::NxMessage)
    } else {
        Ok(ixs)
    }
}

impl Mailbox {
    /// Select the messages in the folder at `path` addressed by `range`.
    ///
    /// An empty selection is not an error here; it is up to the caller to
    /// decide what that means.
    pub fn message_range(
        &self,
        path: &str,
        range: &str,
        mode: RangeMode,
    ) -> Result<Vec<Hit<'_>>, Error> {
        let folder = self.folder(path)?;
        Ok(resolve(&folder.messages, range, mode)
            .into_iter()
            .map(|ix| Hit {
                index: Seqnum::from_index(ix),
                message: &folder.messages[ix],
            })
            .collect())
    }
}
