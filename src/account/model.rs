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
use std::convert::{TryFrom, TryInto};
use std::fmt;
use std::marker::PhantomData;
use std::num::NonZeroU32;
use std::ops::Bound::{Excluded, Included, Unbounded};

use serde::{Deserialize, Serialize};

/// Uniquely identifies a message within a single folder.
///
/// UIDs start at 1 and increase monotonically as messages are added to the
/// folder. UIDs are never reused, even across deletion and recreation of the
/// folder at the same path.
#[derive(
    Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(transparent)]
pub struct Uid(pub NonZeroU32);

impl fmt::Debug for Uid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Uid({})", self.0.get())
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.get())
    }
}

impl Uid {
    pub const MIN: Self = unsafe { Uid(NonZeroU32::new_unchecked(1)) };

    pub fn of(uid: u32) -> Option<Self> {
        NonZeroU32::new(uid).map(Uid)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }

    #[cfg(test)]
    pub fn u(uid: u32) -> Self {
        Uid::of(uid).unwrap()
    }
}

impl TryFrom<u32> for Uid {
    type Error = ();

    fn try_from(v: u32) -> Result<Self, ()> {
        Self::of(v).ok_or(())
    }
}

impl From<Uid> for u32 {
    fn from(uid: Uid) -> u32 {
        uid.0.get()
    }
}

/// The 1-based position of a message within its folder.
#[derive(
    Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(transparent)]
pub struct Seqnum(pub NonZeroU32);

impl Seqnum {
    pub const MIN: Self = unsafe { Seqnum(NonZeroU32::new_unchecked(1)) };

    pub fn of(seqnum: u32) -> Option<Self> {
        NonZeroU32::new(seqnum).map(Seqnum)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }

    #[cfg(test)]
    pub fn u(seqnum: u32) -> Self {
        Seqnum::of(seqnum).unwrap()
    }

    /// Return the index of the message with this sequence number.
    pub fn to_index(self) -> usize {
        self.0.get() as usize - 1
    }

    /// Return the sequence number of the message at index `ix`.
    ///
    /// Folders never get anywhere near `u32::MAX` messages; indices past that
    /// saturate.
    pub fn from_index(ix: usize) -> Self {
        let n: u32 = (ix + 1).try_into().unwrap_or(u32::MAX);
        Seqnum::of(n).unwrap_or(Seqnum::MIN)
    }
}

impl TryFrom<u32> for Seqnum {
    type Error = ();

    fn try_from(v: u32) -> Result<Self, ()> {
        Self::of(v).ok_or(())
    }
}

impl From<Seqnum> for u32 {
    fn from(seqnum: Seqnum) -> u32 {
        seqnum.0.get()
    }
}

impl fmt::Debug for Seqnum {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Seqnum({})", self.0.get())
    }
}

impl fmt::Display for Seqnum {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.get())
    }
}

/// Whether a sequence set addresses messages by position or by UID.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RangeMode {
    Index,
    Uid,
}

/// A sequence set, such as `1:5,7,9:*`, resolved to concrete values.
///
/// Internally, this is a map from the start of each run to its inclusive end,
/// with overlapping and adjacent runs fused.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeqRange<T> {
    parts: BTreeMap<u32, u32>,
    _t: PhantomData<T>,
}

impl<T> SeqRange<T> {
    pub fn new() -> Self {
        SeqRange {
            parts: BTreeMap::new(),
            _t: PhantomData,
        }
    }
}

impl<T: TryFrom<u32> + Into<u32>> SeqRange<T> {
    fn insert_raw(&mut self, start_incl: u32, mut end_incl: u32) {
        // Swallow any later runs the new one reaches
        loop {
            let following = self
                .parts
                .range((Excluded(start_incl), Unbounded))
                .next()
                .map(|(&start, &end)| (start, end));

            match following {
                Some((following_start, following_end))
                    if following_start.saturating_sub(1) <= end_incl =>
                {
                    end_incl = end_incl.max(following_end);
                    self.parts.remove(&following_start);
                },
                _ => break,
            }
        }

        let preceding = self
            .parts
            .range((Unbounded, Included(start_incl)))
            .next_back()
            .map(|(&start, &end)| (start, end));
        match preceding {
            Some((preceding_start, preceding_end))
                if preceding_end.saturating_add(1) >= start_incl =>
            {
                self.parts
                    .insert(preceding_start, end_incl.max(preceding_end));
            },
            _ => {
                self.parts.insert(start_incl, end_incl);
            },
        }
    }

    /// Return whether `v` is in this set.
    pub fn contains(&self, v: T) -> bool {
        self.contains_raw(v.into())
    }

    fn contains_raw(&self, v: u32) -> bool {
        self.parts
            .range(..=v)
            .next_back()
            .map_or(false, |(_, &end)| end >= v)
    }

    /// Iterate the items in this set which are no greater than `max`, in
    /// strictly ascending order.
    pub fn items<'a>(
        &'a self,
        max: impl Into<u32>,
    ) -> impl Iterator<Item = T> + 'a
    where
        T: 'a,
    {
        let max: u32 = max.into();
        self.parts
            .iter()
            .filter(move |&(&start, _)| start <= max)
            .flat_map(move |(&start, &end)| start..=end.min(max))
            .filter_map(|v| T::try_from(v).ok())
    }

    /// Parse a sequence set.
    ///
    /// `splat` is the value of `*`: the highest UID or the message count.
    ///
    /// Parsing is lenient and never fails. An endpoint which is zero, not a
    /// number, or a `*` standing for an empty folder is read as 1 when it
    /// starts a run, and as the start of the run when it ends one. A token
    /// with more than one `:` uses its first and last parts.
    pub fn parse(raw: &str, splat: u32) -> Self {
        fn endpoint(raw: &str, splat: u32) -> Option<u32> {
            let raw = raw.trim();
            if "*" == raw {
                Some(splat)
            } else {
                raw.parse::<u32>().ok()
            }
            .filter(|&v| v > 0)
        }

        let mut this = Self::new();
        for token in raw.split(',') {
            let mut parts = token.split(':');
            let first = parts.next().unwrap_or("");
            let start = endpoint(first, splat).unwrap_or(1);
            let end = parts
                .last()
                .and_then(|last| endpoint(last, splat))
                .unwrap_or(start);
            this.insert_raw(start.min(end), start.max(end));
        }

        this
    }

}

/// Well-known message flags.
pub mod flags {
    pub const ANSWERED: &str = "\\Answered";
    pub const DELETED: &str = "\\Deleted";
    pub const DRAFT: &str = "\\Draft";
    pub const FLAGGED: &str = "\\Flagged";
    pub const SEEN: &str = "\\Seen";
}

/// Attributes on folders.
///
/// This includes the RFC 6154 special-use markers. Folders keep their
/// attributes as plain strings alongside any the protocol layer stores, so
/// this type is mostly a source of names.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MailboxAttribute {
    // RFC 3501
    Noselect,
    Noinferiors,
    // RFC 3348
    HasChildren,
    HasNoChildren,
    // RFC 5258
    NonExistent,
    // RFC 6154
    Archive,
    Drafts,
    Flagged,
    Junk,
    Sent,
    Trash,
}

impl MailboxAttribute {
    pub fn name(&self) -> &'static str {
        match *self {
            MailboxAttribute::Noselect => "\\Noselect",
            MailboxAttribute::Noinferiors => "\\Noinferiors",
            MailboxAttribute::HasChildren => "\\HasChildren",
            MailboxAttribute::HasNoChildren => "\\HasNoChildren",
            MailboxAttribute::NonExistent => "\\NonExistent",
            MailboxAttribute::Archive => "\\Archive",
            MailboxAttribute::Drafts => "\\Drafts",
            MailboxAttribute::Flagged => "\\Flagged",
            MailboxAttribute::Junk => "\\Junk",
            MailboxAttribute::Sent => "\\Sent",
            MailboxAttribute::Trash => "\\Trash",
        }
    }

    /// Whether `flags` carries this attribute.
    ///
    /// `\Noinferiors` is matched case-insensitively, since it has been
    /// spelt both ways in stored data.
    pub fn is_in(&self, flags: &[String]) -> bool {
        let name = self.name();
        flags.iter().any(|f| name.eq_ignore_ascii_case(f))
    }
}

impl fmt::Display for MailboxAttribute {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl fmt::Debug for MailboxAttribute {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        <MailboxAttribute as fmt::Display>::fmt(self, f)
    }
}

/// Add `flag` to `flags` unless already present.
pub fn ensure_flag(flags: &mut Vec<String>, flag: &str) {
    if !flags.iter().any(|f| f == flag) {
        flags.push(flag.to_owned());
    }
}

/// Remove every occurrence of `flag` from `flags`.
pub fn remove_flag(flags: &mut Vec<String>, flag: &str) {
    flags.retain(|f| f != flag);
}

/// Make `on` present and `off` absent.
pub fn toggle_flags(flags: &mut Vec<String>, on: &str, off: &str) {
    remove_flag(flags, off);
    ensure_flag(flags, on);
}

/// Update the `\HasChildren`/`\HasNoChildren` pair so exactly one holds.
pub fn set_has_children(flags: &mut Vec<String>, has_children: bool) {
    let (on, off) = if has_children {
        (MailboxAttribute::HasChildren, MailboxAttribute::HasNoChildren)
    } else {
        (MailboxAttribute::HasNoChildren, MailboxAttribute::HasChildren)
    };
    toggle_flags(flags, on.name(), off.name());
}

/// The kind of a namespace, as reported by the NAMESPACE command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamespaceKind {
    Personal,
    Other,
    Shared,
}

impl Default for NamespaceKind {
    fn default() -> Self {
        NamespaceKind::Personal
    }
}

/// A value in a message's open-ended property map.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Property {
    Single(String),
    List(Vec<String>),
}

impl Property {
    /// Return the values of this property as a list.
    pub fn values(&self) -> Vec<String> {
        match *self {
            Property::Single(ref s) => vec![s.clone()],
            Property::List(ref l) => l.clone(),
        }
    }

    fn is_blank(&self) -> bool {
        match *self {
            Property::Single(ref s) => s.is_empty(),
            Property::List(_) => false,
        }
    }

    /// Merge `value` into an existing property.
    ///
    /// An absent or empty value is simply replaced; otherwise the result is
    /// a list of the old values followed by the new ones.
    pub fn merge(existing: Option<Property>, value: &Property) -> Property {
        match existing {
            None => value.clone(),
            Some(ref e) if e.is_blank() => value.clone(),
            Some(e) => {
                let mut list = e.values();
                list.extend(value.values());
                Property::List(list)
            },
        }
    }

    /// Remove every value in `remove` from an existing property, yielding a
    /// list.
    pub fn without(existing: Option<&Property>, remove: &Property) -> Property {
        let remove = remove.values();
        Property::List(
            existing
                .map(Property::values)
                .unwrap_or_default()
                .into_iter()
                .filter(|v| !remove.contains(v))
                .collect(),
        )
    }
}
