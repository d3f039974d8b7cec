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

//! The message scanner.
//!
//! Messages are scanned one line at a time. Each part starts out reading
//! headers; the first blank line ends them, at which point the headers are
//! decoded and the part switches to reading body lines. Body lines are
//! checked against the enclosing part's boundary (which ends this part and
//! possibly starts a sibling) and then against the part's own boundary
//! (which starts a child).
//!
//! Nothing here ever fails. Malformed structure just produces a less
//! interesting tree.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::mem;

use lazy_static::lazy_static;
use regex::Regex;

use super::header::{self, ADDRESS_HEADERS};
use super::model::*;

lazy_static! {
    static ref LINE_ENDING: Regex = Regex::new(r"\r?\n").unwrap();
}

/// Parse a raw message.
///
/// The bytes are read as UTF-8 if they are valid UTF-8 and as Latin-1
/// otherwise, so every input has some textual reading.
pub fn parse(raw: &[u8]) -> ParsedMessage {
    let text = decode(raw);
    let mut scanner = Scanner::new();
    for (line, br) in Lines::new(&text) {
        scanner.push_line(line, br);
    }
    scanner.finish()
}

/// Decode raw message bytes into text.
pub fn decode(raw: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(raw) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => encoding_rs::mem::decode_latin1(raw),
    }
}

/// Convert every line ending, LF or CRLF, to CRLF.
pub fn normalise_line_endings(s: &str) -> String {
    LINE_ENDING.replace_all(s, "\r\n").into_owned()
}

/// Splits text into `(line, line_break)` pairs.
///
/// The line break is `"\r\n"` or `"\n"`, whichever ended the line, or `""`
/// for the final line. There is always a final line, even if it is empty, so
/// an input ending in a line break yields a trailing empty line.
struct Lines<'a> {
    text: &'a str,
    done: bool,
}

impl<'a> Lines<'a> {
    fn new(text: &'a str) -> Self {
        Lines { text, done: false }
    }
}

impl<'a> Iterator for Lines<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match memchr::memchr(b'\n', self.text.as_bytes()) {
            None => {
                self.done = true;
                Some((self.text, ""))
            },
            Some(lf) => {
                let (line, br) = if lf > 0 && b'\r' == self.text.as_bytes()[lf - 1]
                {
                    (&self.text[..lf - 1], &self.text[lf - 1..=lf])
                } else {
                    (&self.text[..lf], &self.text[lf..=lf])
                };
                self.text = &self.text[lf + 1..];
                Some((line, br))
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Header,
    Body,
}

/// A node under construction.
///
/// Nodes live in `Scanner::nodes` and refer to each other by index. The
/// links only exist while scanning; `finish()` turns them into a plain tree.
#[derive(Debug)]
struct PendingNode {
    state: State,
    header: Vec<String>,
    parsed_header: BTreeMap<String, HeaderValue>,
    is_multipart: Option<String>,
    boundary: Option<String>,
    parent_boundary: Option<String>,
    body: Vec<String>,
    children: Vec<usize>,
}

impl PendingNode {
    fn new(parent_boundary: Option<String>) -> Self {
        PendingNode {
            state: State::Header,
            header: Vec::new(),
            parsed_header: BTreeMap::new(),
            is_multipart: None,
            boundary: None,
            parent_boundary,
            body: Vec::new(),
            children: Vec::new(),
        }
    }
}

struct Scanner {
    /// Node 0 is a synthetic container; the message is its first child.
    nodes: Vec<PendingNode>,
    /// The chain of open nodes from the container down to the current one.
    open: Vec<usize>,
    raw_body: String,
    prev_br: String,
}

impl Scanner {
    fn new() -> Self {
        let mut this = Scanner {
            nodes: vec![PendingNode::new(None)],
            open: vec![0],
            raw_body: String::new(),
            prev_br: String::new(),
        };
        this.open_child();
        this
    }

    fn current(&mut self) -> &mut PendingNode {
        let ix = self.open.last().copied().unwrap_or(0);
        &mut self.nodes[ix]
    }

    /// Start a new node under the current one and make it current.
    fn open_child(&mut self) {
        let parent = self.open.last().copied().unwrap_or(0);
        let ix = self.nodes.len();
        let parent_boundary = self.nodes[parent].boundary.clone();
        self.nodes.push(PendingNode::new(parent_boundary));
        self.nodes[parent].children.push(ix);
        self.open.push(ix);
    }

    /// Return to the parent of the current node.
    fn close(&mut self) {
        // The message node itself never has a parent boundary, so this never
        // gets down to the container.
        if self.open.len() > 2 {
            self.open.pop();
        }
    }

    fn push_line(&mut self, line: &str, br: &str) {
        match self.current().state {
            State::Header => {
                if line.is_empty() {
                    self.end_header();
                } else {
                    self.current().header.push(line.to_owned());
                }
            },

            State::Body => {
                self.raw_body.push_str(&self.prev_br);
                self.raw_body.push_str(line);

                let node = self.current();
                let (ends_part, ends_parent) = match node.parent_boundary {
                    Some(ref pb) => is_delimiter(line, pb),
                    None => (false, false),
                };
                let starts_child = !ends_part
                    && !ends_parent
                    && node
                        .boundary
                        .as_ref()
                        .map_or(false, |b| is_delimiter(line, b) == (true, false));

                if ends_part {
                    self.close();
                    self.open_child();
                } else if ends_parent {
                    self.close();
                } else if starts_child {
                    self.open_child();
                } else {
                    let mut stored = String::with_capacity(line.len() + br.len());
                    stored.push_str(line);
                    stored.push_str(br);
                    node.body.push(stored);
                }
            },
        }

        self.prev_br.clear();
        self.prev_br.push_str(br);
    }

    fn end_header(&mut self) {
        let node = self.current();
        let lines = header::unfold(mem::take(&mut node.header));

        let mut occurrences: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for line in &lines {
            let (name, value) = header::split_header(line);
            occurrences.entry(name).or_default().push(value);
        }

        let mut parsed = BTreeMap::new();
        for (name, mut values) in occurrences {
            let value = if "content-type" == name
                || "content-disposition" == name
            {
                HeaderValue::Params(header::parse_value_params(
                    &values.pop().unwrap_or_default(),
                ))
            } else if ADDRESS_HEADERS.contains(&name.as_str()) {
                HeaderValue::Addresses(
                    values
                        .iter()
                        .flat_map(|v| header::parse_address_list(v))
                        .collect(),
                )
            } else if 1 == values.len() {
                HeaderValue::Text(values.pop().unwrap_or_default())
            } else {
                HeaderValue::Repeated(values)
            };
            parsed.insert(name, value);
        }

        let has_content_type = match parsed.get("content-type") {
            Some(&HeaderValue::Params(ref p)) => !p.value.is_empty(),
            _ => false,
        };
        if !has_content_type {
            parsed.insert(
                "content-type".to_owned(),
                HeaderValue::Params(header::parse_value_params("text/plain")),
            );
        }

        if let Some(&HeaderValue::Params(ref ct)) = parsed.get("content-type")
        {
            if "multipart" == ct.type_ {
                if let Some(boundary) =
                    ct.params.get("boundary").filter(|b| !b.is_empty())
                {
                    node.is_multipart = Some(ct.subtype.clone());
                    node.boundary = Some(boundary.clone());
                }
            }
        }

        node.header = lines;
        node.parsed_header = parsed;
        node.state = State::Body;
    }

    fn finish(mut self) -> ParsedMessage {
        // A message that ends inside its headers still gets them decoded
        let unfinished = self
            .nodes
            .iter()
            .enumerate()
            .filter(|&(_, n)| State::Header == n.state)
            .map(|(ix, _)| ix)
            .filter(|&ix| 0 != ix)
            .collect::<Vec<_>>();
        for ix in unfinished {
            self.open.push(ix);
            self.end_header();
            self.open.pop();
        }

        let root = self.nodes[0]
            .children
            .first()
            .copied()
            .map(|ix| self.build(ix))
            .unwrap_or_default();

        let text = if self.raw_body.starts_with("\r\n") {
            self.raw_body[2..].to_owned()
        } else if self.raw_body.starts_with('\n') {
            self.raw_body[1..].to_owned()
        } else {
            mem::take(&mut self.raw_body)
        };

        ParsedMessage { root, text }
    }

    fn build(&mut self, ix: usize) -> MimeNode {
        let children = mem::take(&mut self.nodes[ix].children);
        let child_nodes =
            children.into_iter().map(|c| self.build(c)).collect();

        let node = &mut self.nodes[ix];
        let body = normalise_line_endings(&node.body.concat());
        MimeNode {
            raw_header_lines: mem::take(&mut node.header),
            parsed_header: mem::take(&mut node.parsed_header),
            is_multipart: node.is_multipart.take(),
            boundary: node.boundary.take(),
            child_nodes,
            size: body.len(),
            line_count: node.body.len(),
            body,
        }
    }
}

/// Check whether `line` is a delimiter for `boundary`.
///
/// Returns `(is_delimiter, is_close_delimiter)`.
fn is_delimiter(line: &str, boundary: &str) -> (bool, bool) {
    let rest = match line.strip_prefix("--") {
        Some(rest) => rest,
        None => return (false, false),
    };
    let rest = match rest.strip_prefix(boundary) {
        Some(rest) => rest,
        None => return (false, false),
    };

    match rest {
        "" => (true, false),
        "--" => (false, true),
        _ => (false, false),
    }
}
