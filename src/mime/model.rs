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

use serde::{Deserialize, Serialize};

/// One node of a parsed message.
///
/// The whole message is itself a node; multipart nodes carry their parts in
/// `child_nodes`. The tree holds no back-references and serialises as plain
/// nested objects.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MimeNode {
    /// Header lines in source order, with folded continuation lines joined
    /// onto the line they continue (separated by CRLF).
    pub raw_header_lines: Vec<String>,
    /// Decoded headers, keyed by lower-case name.
    pub parsed_header: BTreeMap<String, HeaderValue>,
    /// The multipart subtype (e.g. `mixed`) if this is a multipart node.
    #[serde(default)]
    pub is_multipart: Option<String>,
    /// This node's own multipart boundary, without the leading `--`.
    #[serde(default)]
    pub boundary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub child_nodes: Vec<MimeNode>,
    /// The body with all line endings normalised to CRLF.
    pub body: String,
    /// Length of `body` in bytes.
    pub size: usize,
    pub line_count: usize,
}

impl MimeNode {
    pub fn header(&self, name: &str) -> Option<&HeaderValue> {
        self.parsed_header.get(name)
    }

    /// Return the first plain-text value of the named header.
    ///
    /// Structured headers (content type, addresses) have no plain-text value.
    pub fn header_text(&self, name: &str) -> Option<&str> {
        match self.parsed_header.get(name)? {
            &HeaderValue::Text(ref s) => Some(s),
            &HeaderValue::Repeated(ref v) => v.first().map(String::as_str),
            _ => None,
        }
    }

    pub fn content_type(&self) -> Option<&ValueParams> {
        match self.parsed_header.get("content-type")? {
            &HeaderValue::Params(ref p) => Some(p),
            _ => None,
        }
    }

    pub fn addresses(&self, name: &str) -> &[Address] {
        match self.parsed_header.get(name) {
            Some(&HeaderValue::Addresses(ref a)) => a,
            _ => &[],
        }
    }
}

/// The decoded value of a header.
///
/// Variants are tried in order when deserialising, so an empty list reads
/// back as `Addresses`; `Repeated` always has at least two values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderValue {
    /// The header occurred once.
    Text(String),
    /// `Content-Type` and `Content-Disposition`.
    Params(ValueParams),
    /// Address-bearing headers, with all occurrences concatenated.
    Addresses(Vec<Address>),
    /// The header occurred several times; values are in source order.
    Repeated(Vec<String>),
}

/// A header value of the form `primary; key=value; ...`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueParams {
    /// The primary value, trimmed but otherwise verbatim.
    pub value: String,
    /// The part of `value` before the first `/`, lower-cased.
    #[serde(rename = "type")]
    pub type_: String,
    /// The part of `value` after the first `/`.
    pub subtype: String,
    pub params: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// The display name, or the group name for groups.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<Vec<Address>>,
}

/// The result of parsing a whole message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedMessage {
    pub root: MimeNode,
    /// Every body line of every part, in order, with the line breaks found in
    /// the source and the first leading line break removed. Part headers are
    /// not included. This is what body searches look at.
    pub text: String,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn header_values_read_back_as_written() {
        let mut params = BTreeMap::new();
        params.insert("charset".to_owned(), "utf-8".to_owned());
        let values = vec![
            HeaderValue::Text("hello".to_owned()),
            HeaderValue::Repeated(vec!["a".to_owned(), "b".to_owned()]),
            HeaderValue::Params(ValueParams {
                value: "text/plain".to_owned(),
                type_: "text".to_owned(),
                subtype: "plain".to_owned(),
                params,
            }),
            HeaderValue::Addresses(vec![]),
            HeaderValue::Addresses(vec![Address {
                name: "Alice".to_owned(),
                address: Some("alice@example.com".to_owned()),
                group: None,
            }]),
        ];

        for value in values {
            let json = serde_json::to_string(&value).unwrap();
            assert_eq!(
                value,
                serde_json::from_str::<HeaderValue>(&json).unwrap(),
                "{}",
                json
            );
        }
    }
}
