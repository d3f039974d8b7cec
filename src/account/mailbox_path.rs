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

//! Folder path handling and `LIST` pattern matching.
//!
//! A folder path is a string of names joined by the separator of the
//! namespace the folder lives in. The namespace prefix itself ends with that
//! separator (or is empty), so `Shared/team` lives in the `Shared/`
//! namespace and `work/reports` in the empty one.

use regex::Regex;

/// Split `path` into its non-empty parts.
///
/// A leading `INBOX` part is normalised to upper case since that name is
/// case-insensitive.
pub fn parse_folder_path<'a>(
    path: &'a str,
    separator: char,
) -> impl Iterator<Item = &'a str> + 'a {
    path.split(separator)
        .filter(|s| !s.is_empty())
        .enumerate()
        .map(|(ix, s)| {
            if 0 == ix && "inbox".eq_ignore_ascii_case(s) {
                "INBOX"
            } else {
                s
            }
        })
}

/// Whether `path` names the inbox.
pub fn is_inbox(path: &str) -> bool {
    "INBOX".eq_ignore_ascii_case(path)
}

/// Join `name` onto `parent`.
///
/// An empty parent is the root of the empty namespace; a parent which
/// already ends in the separator is a namespace prefix.
pub fn join_path(parent: &str, separator: char, name: &str) -> String {
    if parent.is_empty() {
        name.to_owned()
    } else if parent.ends_with(separator) {
        format!("{}{}", parent, name)
    } else {
        format!("{}{}{}", parent, separator, name)
    }
}

/// Return the path of the parent of `path`, if it has one.
pub fn parent_path(path: &str, separator: char) -> Option<&str> {
    path.rfind(separator).map(|ix| &path[..ix])
}

/// Creates a predicate which identifies which folder paths match `pattern`,
/// with pattern matching performed as per RFC 3501.
///
/// `*` matches anything, while `%` matches anything but `separator`. The
/// pattern is first normalised by `parse_folder_path`.
pub fn folder_path_matcher(
    pattern: &str,
    separator: char,
) -> impl Fn(&str) -> bool {
    let sep_rx = regex::escape(&separator.to_string());
    let mut rx = "^".to_owned();

    for (part_ix, part) in parse_folder_path(pattern, separator).enumerate() {
        if part_ix > 0 {
            rx.push_str(&sep_rx);
        }

        let mut start = 0;
        for end in part
            .match_indices(|c| '%' == c || '*' == c)
            .map(|(ix, _)| ix)
            .chain(part.len()..=part.len())
        {
            let chunk = &part[start..end];
            start = (end + 1).min(part.len());

            rx.push_str(&regex::escape(chunk));
            match part.get(end..end + 1) {
                Some("*") => rx.push_str(".*"),
                Some("%") => {
                    rx.push_str("[^");
                    rx.push_str(&sep_rx);
                    rx.push_str("]*");
                },
                _ => (),
            }
        }
    }
    rx.push('$');

    let rx = Regex::new(&rx).expect("Built invalid regex?");
    move |s| rx.is_match(s)
}
