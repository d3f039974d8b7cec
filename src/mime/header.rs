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

//! Decoding of individual header lines and values.
//!
//! Everything here is robust moreso than strictly correct: input that does
//! not follow the grammar is passed through in the most useful form rather
//! than rejected.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use log::trace;
use mailparse::MailAddr;
use regex::Regex;

use super::model::{Address, ValueParams};

lazy_static! {
    static ref FOLD: Regex = Regex::new(r"\s*\r?\n\s*").unwrap();
    static ref EXTENDED_KEY: Regex = Regex::new(r"^([^*]+)\*(\d+)?\*?$").unwrap();
}

/// Headers whose values are address lists.
pub const ADDRESS_HEADERS: &[&str] =
    &["from", "sender", "reply-to", "to", "cc", "bcc"];

/// Join folded header lines onto the line they continue.
///
/// A line starting with whitespace continues the line before it; the two are
/// joined with a CRLF so the fold is still visible. A leading whitespace line
/// with nothing before it stands on its own.
pub fn unfold(lines: Vec<String>) -> Vec<String> {
    let mut unfolded: Vec<String> = Vec::with_capacity(lines.len());
    for line in lines {
        match unfolded.last_mut() {
            Some(prev) if line.starts_with(char::is_whitespace) => {
                prev.push_str("\r\n");
                prev.push_str(&line);
            },
            _ => unfolded.push(line),
        }
    }

    unfolded
}

/// Split an unfolded header line into its lower-case name and its value.
///
/// A line without a colon is all name and no value.
pub fn split_header(line: &str) -> (String, String) {
    let mut parts = line.splitn(2, ':');
    let name = parts.next().unwrap_or("").trim().to_lowercase();
    let value = parts.next().unwrap_or("").trim();
    (name, collapse_folds(value))
}

/// Replace every fold (and the whitespace around it) with a single space.
pub fn collapse_folds(value: &str) -> String {
    FOLD.replace_all(value, " ").into_owned()
}

/// Parse a `primary; key=value; ...` header value.
///
/// RFC 2231 parameters (`key*=charset'lang'value` and the continued
/// `key*0*=...; key*1*=...` forms) are reassembled and re-expressed as a
/// single RFC 2047 encoded word in Q form, so that callers only ever need one
/// decoder for non-ASCII parameter values.
pub fn parse_value_params(raw: &str) -> ValueParams {
    let mut parsed = ValueParams::default();
    let mut extended: BTreeMap<String, BTreeMap<usize, String>> =
        BTreeMap::new();

    let mut segments = raw.split(';');
    parsed.value = segments.next().unwrap_or("").trim().to_owned();
    {
        let mut type_parts = parsed.value.splitn(2, '/');
        parsed.type_ = type_parts.next().unwrap_or("").to_lowercase();
        parsed.subtype = type_parts.next().unwrap_or("").to_owned();
    }

    for segment in segments {
        let mut kv = segment.splitn(2, '=');
        let key = kv.next().unwrap_or("").trim().to_lowercase();
        let value = unquote(kv.next().unwrap_or(""));
        if key.is_empty() {
            continue;
        }

        if let Some(cap) = EXTENDED_KEY.captures(&key) {
            let index = cap
                .get(2)
                .and_then(|ix| ix.as_str().parse::<usize>().ok())
                .unwrap_or(0);
            extended
                .entry(cap[1].to_owned())
                .or_default()
                .insert(index, value.to_owned());
        } else {
            parsed.params.insert(key, value.to_owned());
        }
    }

    for (name, fragments) in extended {
        let mut charset = "";
        let mut encoded = String::new();
        for fragment in fragments.values() {
            if charset.is_empty() && fragment.contains('\'') {
                charset = fragment.split('\'').next().unwrap_or("");
            }
            encoded.push_str(
                &fragment.rsplit('\'').next().unwrap_or("").replace('%', "="),
            );
        }

        let charset = if charset.is_empty() {
            "ISO-8859-1".to_owned()
        } else {
            charset.to_uppercase()
        };
        parsed
            .params
            .insert(name, format!("=?{}?Q?{}?=", charset, encoded));
    }

    parsed
}

/// Strip surrounding quotes and whitespace from a parameter value.
fn unquote(s: &str) -> &str {
    s.trim_matches(|c: char| '"' == c || '\'' == c || c.is_whitespace())
}

/// Parse an address list.
///
/// Values the address parser rejects become a single entry: an address if it
/// looks like one, or a bare name otherwise.
pub fn parse_address_list(raw: &str) -> Vec<Address> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Vec::new();
    }

    match mailparse::addrparse(raw) {
        Ok(list) => list.iter().map(convert_address).collect(),
        Err(e) => {
            trace!("Unparseable address list {:?}: {}", raw, e);
            vec![if raw.contains('@') {
                Address {
                    address: Some(raw.to_owned()),
                    ..Address::default()
                }
            } else {
                Address {
                    name: raw.to_owned(),
                    ..Address::default()
                }
            }]
        },
    }
}

fn convert_address(addr: &MailAddr) -> Address {
    match *addr {
        MailAddr::Single(ref info) => Address {
            name: info.display_name.clone().unwrap_or_default(),
            address: Some(info.addr.clone()),
            group: None,
        },
        MailAddr::Group(ref info) => Address {
            name: info.group_name.clone(),
            address: None,
            group: Some(
                info.addrs
                    .iter()
                    .map(|single| Address {
                        name: single.display_name.clone().unwrap_or_default(),
                        address: Some(single.addr.clone()),
                        group: None,
                    })
                    .collect(),
            ),
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn s(v: &[&str]) -> Vec<String> {
        v.iter().map(|&s| s.to_owned()).collect()
    }

    #[test]
    fn test_unfold() {
        assert_eq!(
            s(&["Subject: foo\r\n bar\r\n\tbaz", "To: x"]),
            unfold(s(&["Subject: foo", " bar", "\tbaz", "To: x"]))
        );
        assert_eq!(s(&[" lead", "A: b"]), unfold(s(&[" lead", "A: b"])));
        assert!(unfold(Vec::new()).is_empty());
    }

    #[test]
    fn test_split_header() {
        assert_eq!(
            ("subject".to_owned(), "foo bar".to_owned()),
            split_header("Subject : foo\r\n   bar ")
        );
        assert_eq!(
            ("x-time".to_owned(), "12:30:00".to_owned()),
            split_header("X-Time: 12:30:00")
        );
        assert_eq!(
            ("garbage".to_owned(), "".to_owned()),
            split_header("Garbage")
        );
    }

    #[test]
    fn simple_params() {
        let p = parse_value_params("Text/Plain; charset=\"utf-8\"; Format=flowed");
        assert_eq!("Text/Plain", p.value);
        assert_eq!("text", p.type_);
        assert_eq!("Plain", p.subtype);
        assert_eq!(Some("utf-8"), p.params.get("charset").map(String::as_str));
        assert_eq!(Some("flowed"), p.params.get("format").map(String::as_str));
    }

    #[test]
    fn no_subtype() {
        let p = parse_value_params("attachment");
        assert_eq!("attachment", p.type_);
        assert_eq!("", p.subtype);
        assert!(p.params.is_empty());
    }

    #[test]
    fn subtype_keeps_later_slashes() {
        let p = parse_value_params("a/b/c");
        assert_eq!("a", p.type_);
        assert_eq!("b/c", p.subtype);
    }

    #[test]
    fn value_with_equals() {
        let p = parse_value_params("multipart/mixed; boundary=\"==abc==\"");
        assert_eq!(Some("==abc=="), p.params.get("boundary").map(String::as_str));
    }

    #[test]
    fn rfc2231_params() {
        let p =
            parse_value_params("text/plain; charset*0*=UTF-8''Hello%20World");
        assert_eq!(
            Some("=?UTF-8?Q?Hello=20World?="),
            p.params.get("charset").map(String::as_str)
        );

        let p = parse_value_params(
            "attachment; filename*1*=%20part%21; filename*0*=utf-8'en'first",
        );
        assert_eq!(
            Some("=?UTF-8?Q?first=20part=21?="),
            p.params.get("filename").map(String::as_str)
        );

        let p = parse_value_params("attachment; filename*=plain");
        assert_eq!(
            Some("=?ISO-8859-1?Q?plain?="),
            p.params.get("filename").map(String::as_str)
        );
    }

    #[test]
    fn addresses() {
        let a = parse_address_list("\"Doe, John\" <john@example.com>, jane@example.com");
        assert_eq!(2, a.len());
        assert_eq!("Doe, John", a[0].name);
        assert_eq!(Some("john@example.com"), a[0].address.as_deref());
        assert_eq!("", a[1].name);
        assert_eq!(Some("jane@example.com"), a[1].address.as_deref());

        let a = parse_address_list("Team: a@example.com, b@example.com;");
        assert_eq!(1, a.len());
        assert_eq!("Team", a[0].name);
        assert_eq!(2, a[0].group.as_ref().unwrap().len());

        assert!(parse_address_list("  ").is_empty());
    }
}
