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

//! Structured search over the messages of one folder.
//!
//! A query is a JSON object mapping search keys to arguments, e.g.
//!
//! ```text
//! { "headers": { "from": "alice" },
//!   "flags": ["\\Seen", { "not": "\\Deleted" }],
//!   "or": { "size": { "gt": 1000 }, "body": "invoice" } }
//! ```
//!
//! Every top-level key must match for a message to be found. The keys inside
//! `or` instead need only one of them to match. Since JSON objects can't
//! usefully repeat a key, `or` also accepts an array of objects, which are
//! concatenated; repeated keys are nonetheless honoured when a query is
//! parsed directly from text.
//!
//! Queries are validated when they are built, so an unknown key or a
//! malformed argument is reported before anything is evaluated.

use std::fmt;

use chrono::prelude::*;
use log::{debug, warn};
use serde::de::{Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_json::Value;

use super::defs::*;
use super::range::resolve;
use crate::account::model::*;
use crate::mime::header::split_header;
use crate::mime::parser::decode;
use crate::support::chronox::parse_calendar_day;
use crate::support::error::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DateOp {
    /// On or after the day.
    Ge,
    /// Before the day, on a different day of the month.
    Lt,
    /// On the day.
    Eq,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SizeOp {
    Gt,
    Lt,
    Eq,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeaderTest {
    /// Some occurrence of the header contains the text, ignoring case.
    Contains { name: String, needle: String },
    /// The message date compares with the day.
    Date(DateOp, NaiveDate),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlagTest {
    Has(String),
    Lacks(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Predicate {
    /// Messages at positions in the sequence set.
    Index(String),
    /// Messages with UIDs in the sequence set.
    Uid(String),
    /// Messages passing any of the tests.
    Headers(Vec<HeaderTest>),
    Date(DateOp, NaiveDate),
    /// The full text of the message body contains the text, ignoring case.
    Body(String),
    /// The raw message contains the text, ignoring case.
    Text(String),
    /// Messages passing all of the tests.
    Flags(Vec<FlagTest>),
    Size(SizeOp, u64),
    /// Messages matching any of the predicates.
    Or(Vec<Predicate>),
}

/// A validated search query.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Query {
    pub predicates: Vec<Predicate>,
}

/// A query as written, before validation, keeping repeated keys.
#[derive(Clone, Debug, Default)]
struct RawQuery(Vec<(String, RawArg)>);

#[derive(Clone, Debug)]
enum RawArg {
    Value(Value),
    Nested(RawQuery),
}

impl<'de> Deserialize<'de> for RawQuery {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        de.deserialize_any(RawQueryVisitor)
    }
}

struct RawQueryVisitor;

impl<'de> Visitor<'de> for RawQueryVisitor {
    type Value = RawQuery;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of search keys to arguments")
    }

    fn visit_map<A: MapAccess<'de>>(
        self,
        mut map: A,
    ) -> Result<RawQuery, A::Error> {
        let mut entries = vec![];
        while let Some(key) = map.next_key::<String>()? {
            let arg = if "or" == key {
                RawArg::Nested(map.next_value()?)
            } else {
                RawArg::Value(map.next_value()?)
            };
            entries.push((key, arg));
        }
        Ok(RawQuery(entries))
    }

    fn visit_seq<A: SeqAccess<'de>>(
        self,
        mut seq: A,
    ) -> Result<RawQuery, A::Error> {
        let mut entries = vec![];
        while let Some(RawQuery(mut more)) = seq.next_element()? {
            entries.append(&mut more);
        }
        Ok(RawQuery(entries))
    }
}

impl Query {
    /// Parse and validate a query written as JSON text.
    pub fn parse(json: &str) -> Result<Self, Error> {
        let raw: RawQuery = serde_json::from_str(json)?;
        Self::build(raw)
    }

    /// Validate a query already parsed as JSON.
    pub fn from_json(value: &Value) -> Result<Self, Error> {
        let raw = RawQuery::deserialize(value)
            .map_err(|e| Error::BadSearchValue(e.to_string()))?;
        Self::build(raw)
    }

    fn build(raw: RawQuery) -> Result<Self, Error> {
        Ok(Query {
            predicates: build_predicates(raw)?,
        })
    }
}

fn build_predicates(raw: RawQuery) -> Result<Vec<Predicate>, Error> {
    raw.0
        .into_iter()
        .map(|(key, arg)| match arg {
            RawArg::Nested(nested) => {
                Ok(Predicate::Or(build_predicates(nested)?))
            },
            RawArg::Value(value) => build_predicate(&key, &value),
        })
        .collect()
}

fn bad(key: &str) -> Error {
    Error::BadSearchValue(key.to_owned())
}

fn build_predicate(key: &str, value: &Value) -> Result<Predicate, Error> {
    match key {
        "index" => Ok(Predicate::Index(scalar(value).ok_or_else(|| bad(key))?)),
        "uid" => Ok(Predicate::Uid(scalar(value).ok_or_else(|| bad(key))?)),
        "headers" => {
            let map = value.as_object().ok_or_else(|| bad(key))?;
            map.iter()
                .map(|(name, needle)| {
                    let name = name.to_lowercase();
                    if "date" == name && needle.is_object() {
                        let (op, day) = date_test(needle)?;
                        Ok(HeaderTest::Date(op, day))
                    } else {
                        let needle = if needle.is_null() {
                            String::new()
                        } else {
                            scalar(needle).ok_or_else(|| bad(key))?
                        };
                        Ok(HeaderTest::Contains { name, needle })
                    }
                })
                .collect::<Result<Vec<_>, Error>>()
                .map(Predicate::Headers)
        },
        "date" => {
            let (op, day) = date_test(value)?;
            Ok(Predicate::Date(op, day))
        },
        "body" => Ok(Predicate::Body(scalar(value).ok_or_else(|| bad(key))?)),
        "text" => Ok(Predicate::Text(scalar(value).ok_or_else(|| bad(key))?)),
        "flags" => {
            let entries = match *value {
                Value::Array(ref a) => a.iter().collect::<Vec<_>>(),
                ref v => vec![v],
            };
            entries
                .into_iter()
                .map(|entry| match *entry {
                    Value::String(ref flag) => Ok(FlagTest::Has(flag.clone())),
                    Value::Object(ref o) => o
                        .get("not")
                        .and_then(Value::as_str)
                        .map(|flag| FlagTest::Lacks(flag.to_owned()))
                        .ok_or_else(|| bad(key)),
                    _ => Err(bad(key)),
                })
                .collect::<Result<Vec<_>, Error>>()
                .map(Predicate::Flags)
        },
        "size" => {
            let map = value.as_object().ok_or_else(|| bad(key))?;
            let (op, arg) = [("gt", SizeOp::Gt), ("lt", SizeOp::Lt), ("eq", SizeOp::Eq)]
                .iter()
                .find_map(|&(name, op)| map.get(name).map(|arg| (op, arg)))
                .ok_or_else(|| bad(key))?;
            let size = arg
                .as_u64()
                .or_else(|| arg.as_str().and_then(|s| s.trim().parse().ok()))
                .ok_or_else(|| bad(key))?;
            Ok(Predicate::Size(op, size))
        },
        "or" => Err(bad(key)),
        _ => Err(Error::BadSearchKey(key.to_owned())),
    }
}

/// Read a string, number, or boolean argument as text.
fn scalar(value: &Value) -> Option<String> {
    match *value {
        Value::String(ref s) => Some(s.clone()),
        Value::Number(ref n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn date_test(value: &Value) -> Result<(DateOp, NaiveDate), Error> {
    let map = value.as_object().ok_or_else(|| bad("date"))?;
    let (op, arg) = [("ge", DateOp::Ge), ("lt", DateOp::Lt), ("eq", DateOp::Eq)]
        .iter()
        .find_map(|&(name, op)| map.get(name).map(|arg| (op, arg)))
        .ok_or_else(|| bad("date"))?;
    let arg = arg.as_str().ok_or_else(|| bad("date"))?;
    let day = parse_calendar_day(arg)
        .or_else(|| NaiveDate::parse_from_str(arg.trim(), "%Y-%m-%d").ok())
        .ok_or_else(|| bad("date"))?;
    Ok((op, day))
}

/// The calendar day of a message: that of its `Date` header if it has one,
/// otherwise that of its internal date.
fn message_day(message: &Message) -> Option<NaiveDate> {
    match message.parsed().root.header_text("date") {
        Some(date) => parse_calendar_day(date),
        None => parse_calendar_day(&message.internaldate),
    }
}

fn compare_day(op: DateOp, day: Option<NaiveDate>, query: NaiveDate) -> bool {
    let day = match day {
        Some(day) => day,
        None => return false,
    };

    match op {
        DateOp::Ge => day >= query,
        DateOp::Eq => day == query,
        // A day with the same day-of-month is never "before", even in an
        // earlier month.
        DateOp::Lt => day < query && day.day() != query.day(),
    }
}

fn contains_ignore_case(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

impl HeaderTest {
    fn matches(&self, message: &Message) -> bool {
        match *self {
            HeaderTest::Contains {
                ref name,
                ref needle,
            } => {
                let needle = needle.to_lowercase();
                message
                    .parsed()
                    .root
                    .raw_header_lines
                    .iter()
                    .map(|line| split_header(line))
                    .any(|(n, value)| {
                        n == *name
                            && (needle.is_empty()
                                || contains_ignore_case(&value, &needle))
                    })
            },
            HeaderTest::Date(op, day) => {
                compare_day(op, message_day(message), day)
            },
        }
    }
}

impl Predicate {
    /// Evaluate against every message of `messages`, returning whether each
    /// one matches.
    fn eval(&self, messages: &[Message]) -> Vec<bool> {
        let by_range = |range: &str, mode: RangeMode| {
            let mut hits = vec![false; messages.len()];
            for ix in resolve(messages, range, mode) {
                hits[ix] = true;
            }
            hits
        };
        let each = |f: &dyn Fn(&Message) -> bool| {
            messages.iter().map(f).collect::<Vec<_>>()
        };

        match *self {
            Predicate::Index(ref range) => by_range(range, RangeMode::Index),
            Predicate::Uid(ref range) => by_range(range, RangeMode::Uid),
            Predicate::Headers(ref tests) => {
                each(&|m| tests.iter().any(|t| t.matches(m)))
            },
            Predicate::Date(op, day) => {
                each(&|m| compare_day(op, message_day(m), day))
            },
            Predicate::Body(ref needle) => {
                let needle = needle.to_lowercase();
                each(&|m| {
                    !needle.is_empty()
                        && contains_ignore_case(&m.parsed().text, &needle)
                })
            },
            Predicate::Text(ref needle) => {
                let needle = needle.to_lowercase();
                each(&|m| {
                    !needle.is_empty()
                        && contains_ignore_case(
                            &decode(m.raw().unwrap_or(&[])),
                            &needle,
                        )
                })
            },
            Predicate::Flags(ref tests) => each(&|m| {
                tests.iter().all(|t| match *t {
                    FlagTest::Has(ref flag) => m.has_flag(flag),
                    FlagTest::Lacks(ref flag) => !m.has_flag(flag),
                })
            }),
            Predicate::Size(op, size) => each(&|m| {
                let actual = m.size() as u64;
                match op {
                    SizeOp::Gt => actual > size,
                    SizeOp::Lt => actual < size,
                    SizeOp::Eq => actual == size,
                }
            }),
            Predicate::Or(ref alternatives) => {
                let mut hits = vec![false; messages.len()];
                for alternative in alternatives {
                    for (hit, m) in hits.iter_mut().zip(alternative.eval(messages)) {
                        *hit |= m;
                    }
                }
                hits
            },
        }
    }
}

impl Predicate {
    /// Whether evaluating this looks at message content.
    fn needs_content(&self) -> bool {
        match *self {
            Predicate::Index(..) | Predicate::Uid(..) | Predicate::Flags(..) => {
                false
            },
            Predicate::Headers(..)
            | Predicate::Date(..)
            | Predicate::Body(..)
            | Predicate::Text(..)
            | Predicate::Size(..) => true,
            Predicate::Or(ref alternatives) => {
                alternatives.iter().any(Predicate::needs_content)
            },
        }
    }
}

impl Query {
    /// Whether running this query needs the content of every message.
    pub fn needs_content(&self) -> bool {
        self.predicates.iter().any(Predicate::needs_content)
    }
}

impl Mailbox {
    /// Find the messages in the folder at `path` matching `query`.
    ///
    /// If the query looks at message content, the content of messages not
    /// yet fetched is fetched from the blob store first. Messages whose
    /// content can't be fetched are searched as if empty; each failure is
    /// logged.
    ///
    /// Results are in folder order. An empty query matches every message.
    pub fn search(
        &mut self,
        path: &str,
        query: &Query,
    ) -> Result<Vec<SearchHit>, Error> {
        if query.needs_content() {
            let count = self.folder(path)?.messages.len();
            let all = (0..count).collect::<Vec<_>>();
            if let Some(e) = self.fetch_content(path, &all)? {
                warn!("{} Searching {} without: {}", self.log_prefix, path, e);
            }
        }

        self.search_loaded(path, query)
    }

    /// Like `search`, but only considers content already in memory.
    ///
    /// This never changes the mailbox, so it can run on several threads at
    /// once.
    pub fn search_loaded(
        &self,
        path: &str,
        query: &Query,
    ) -> Result<Vec<SearchHit>, Error> {
        let folder = self.folder(path)?;
        let messages = &folder.messages;

        let mut hits = vec![true; messages.len()];
        for predicate in &query.predicates {
            for (hit, m) in hits.iter_mut().zip(predicate.eval(messages)) {
                *hit &= m;
            }
        }

        let found = hits
            .into_iter()
            .enumerate()
            .filter(|&(_, hit)| hit)
            .map(|(ix, _)| SearchHit {
                uid: messages[ix].uid(),
                index: Seqnum::from_index(ix),
            })
            .collect::<Vec<_>>();
        debug!(
            "{} Search in {} found {} of {} message(s)",
            self.log_prefix,
            folder.path,
            found.len(),
            messages.len()
        );
        Ok(found)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use rayon::prelude::*;
    use serde_json::json;

    use super::super::test_prelude::*;
    use super::*;
    use crate::account::blob::{BlobStore, MemoryBlobStore};
    use crate::test_data;

    fn set_up_corpus() -> Mailbox {
        let mut mb = set_up();
        mb.append(
            "INBOX",
            test_data::SIMPLE.to_vec(),
            flags(&["\\Seen"]),
            Some("06-Mar-2024 09:00:00 +0000".to_owned()),
        )
        .unwrap();
        mb.append(
            "INBOX",
            test_data::NESTED.to_vec(),
            flags(&["\\Seen", "\\Flagged"]),
            Some("15-Apr-2024 16:00:00 +0000".to_owned()),
        )
        .unwrap();
        mb.append(
            "INBOX",
            test_data::UNDATED.to_vec(),
            vec![],
            Some("20-May-2024 12:00:00 +0000".to_owned()),
        )
        .unwrap();
        mb
    }

    fn uids(mb: &Mailbox, query: Value) -> Vec<u32> {
        let query = Query::from_json(&query).unwrap();
        mb.search_loaded("INBOX", &query)
            .unwrap()
            .into_iter()
            .map(|h| h.uid.get())
            .collect()
    }

    #[test]
    fn query_validation() {
        match Query::from_json(&json!({ "subject": "x" })) {
            Err(Error::BadSearchKey(key)) => assert_eq!("subject", key),
            r => panic!("Unexpected result: {:?}", r),
        }
        assert_matches!(
            Err(Error::BadSearchKey(..)),
            Query::from_json(&json!({ "or": { "nope": 1 } }))
        );
        assert_matches!(
            Err(Error::BadSearchValue(..)),
            Query::from_json(&json!({ "size": { "about": 5 } }))
        );
        assert_matches!(
            Err(Error::BadSearchValue(..)),
            Query::from_json(&json!({ "date": { "ge": "someday" } }))
        );
        assert_matches!(
            Err(Error::BadSearchValue(..)),
            Query::from_json(&json!("flags"))
        );
        assert!(Query::from_json(&json!({ "subject": "x" }))
            .unwrap_err()
            .is_invalid_query());

        assert_eq!(
            Query {
                predicates: vec![
                    Predicate::Uid("1:*".to_owned()),
                    Predicate::Flags(vec![
                        FlagTest::Has("\\Seen".to_owned()),
                        FlagTest::Lacks("\\Deleted".to_owned()),
                    ]),
                    Predicate::Date(
                        DateOp::Ge,
                        NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
                    ),
                ]
            },
            Query::parse(
                r#"{"uid": "1:*",
                    "flags": ["\\Seen", {"not": "\\Deleted"}],
                    "date": {"ge": "05-Mar-2024"}}"#
            )
            .unwrap()
        );
    }

    #[test]
    fn range_predicates() {
        let mb = set_up_corpus();
        assert_eq!(vec![1, 2, 3], uids(&mb, json!({ "uid": "1:*" })));
        assert_eq!(vec![2, 3], uids(&mb, json!({ "index": "2:*" })));
        assert_eq!(vec![3], uids(&mb, json!({ "index": 3 })));
        assert_eq!(Vec::<u32>::new(), uids(&mb, json!({ "uid": "7" })));
        // Top-level keys must all match
        assert_eq!(
            vec![2],
            uids(&mb, json!({ "uid": "2:*", "flags": "\\Seen" }))
        );
        assert_eq!(vec![1, 2, 3], uids(&mb, json!({})));
    }

    #[test]
    fn header_predicates() {
        let mb = set_up_corpus();
        assert_eq!(
            vec![1],
            uids(&mb, json!({ "headers": { "From": "ALICE" } }))
        );
        assert_eq!(
            vec![1, 3],
            uids(&mb, json!({ "headers": { "to": "bob@example.com" } }))
        );
        // Empty value matches any occurrence
        assert_eq!(vec![3], uids(&mb, json!({ "headers": { "x-priority": "" } })));
        assert_eq!(
            Vec::<u32>::new(),
            uids(&mb, json!({ "headers": { "x-mailer": "" } }))
        );
        // Several headers match if any does
        assert_eq!(
            vec![2, 3],
            uids(&mb, json!({ "headers": { "subject": "lunch", "from": "dave" } }))
        );
        assert_eq!(
            vec![2],
            uids(&mb, json!({ "headers": { "date": { "eq": "15-Apr-2024" } } }))
        );
    }

    #[test]
    fn date_predicates() {
        let mb = set_up_corpus();
        // The Date header wins over the internal date where present
        assert_eq!(vec![1], uids(&mb, json!({ "date": { "eq": "05-Mar-2024" } })));
        assert_eq!(Vec::<u32>::new(), uids(&mb, json!({ "date": { "eq": "06-Mar-2024" } })));
        assert_eq!(vec![3], uids(&mb, json!({ "date": { "eq": "2024-05-20" } })));
        assert_eq!(vec![2, 3], uids(&mb, json!({ "date": { "ge": "15 Apr 2024" } })));
        assert_eq!(vec![1, 2], uids(&mb, json!({ "date": { "lt": "01-May-2024" } })));
        // Same day-of-month in an earlier month is not "lt"
        assert_eq!(vec![1], uids(&mb, json!({ "date": { "lt": "15-May-2024" } })));
        assert_eq!(
            Vec::<u32>::new(),
            uids(&mb, json!({ "date": { "lt": "05-Mar-2024" } }))
        );
    }

    #[test]
    fn content_predicates() {
        let mb = set_up_corpus();
        assert_eq!(vec![1], uids(&mb, json!({ "body": "how ARE you" })));
        assert_eq!(vec![2], uids(&mb, json!({ "body": "some notes" })));
        // Headers aren't part of the body text
        assert_eq!(Vec::<u32>::new(), uids(&mb, json!({ "body": "greetings" })));
        assert_eq!(vec![1], uids(&mb, json!({ "text": "greetings" })));
        assert_eq!(vec![2], uids(&mb, json!({ "text": "boundary=\"outer\"" })));
        // Empty needles match nothing
        assert_eq!(Vec::<u32>::new(), uids(&mb, json!({ "body": "" })));
        assert_eq!(Vec::<u32>::new(), uids(&mb, json!({ "text": "" })));
    }

    #[test]
    fn flag_and_size_predicates() {
        let mb = set_up_corpus();
        assert_eq!(vec![1, 2], uids(&mb, json!({ "flags": "\\Seen" })));
        assert_eq!(vec![3], uids(&mb, json!({ "flags": { "not": "\\Seen" } })));
        assert_eq!(
            vec![1],
            uids(&mb, json!({ "flags": ["\\Seen", { "not": "\\Flagged" }] }))
        );

        assert_eq!(vec![1], uids(&mb, json!({ "size": { "eq": 207 } })));
        assert_eq!(vec![2], uids(&mb, json!({ "size": { "gt": 207 } })));
        assert_eq!(vec![3], uids(&mb, json!({ "size": { "lt": "200" } })));
    }

    #[test]
    fn or_predicates() {
        let mb = set_up_corpus();
        assert_eq!(
            vec![1, 3],
            uids(
                &mb,
                json!({ "or": { "body": "lunch", "headers": { "from": "alice" } } })
            )
        );
        // Tautology using a repeated key
        let query = Query::parse(
            r#"{"or": {"flags": "\\Seen", "flags": {"not": "\\Seen"}}}"#,
        )
        .unwrap();
        assert_eq!(3, mb.search_loaded("INBOX", &query).unwrap().len());
        // And the array spelling of the same
        assert_eq!(
            vec![1, 2, 3],
            uids(
                &mb,
                json!({ "or": [{ "flags": "\\Seen" }, { "flags": { "not": "\\Seen" } }] })
            )
        );
        assert_eq!(Vec::<u32>::new(), uids(&mb, json!({ "or": {} })));
    }

    #[test]
    fn parse_happens_once_and_on_demand() {
        let mut mb = set_up_corpus();
        mb.search("INBOX", &Query::from_json(&json!({ "flags": "\\Seen" })).unwrap())
            .unwrap();
        mb.search("INBOX", &Query::from_json(&json!({ "body": "x" })).unwrap())
            .unwrap();
        let first: *const _ = mb.folder("INBOX").unwrap().messages[0].parsed();
        let again: *const _ = mb.folder("INBOX").unwrap().messages[0].parsed();
        assert_eq!(first, again);

        // Replacing the content discards the old parse
        mb.folder_mut("INBOX").unwrap().messages[0]
            .set_raw(b"Subject: new\r\n\r\nfresh body\r\n".to_vec());
        assert_eq!(vec![1], uids(&mb, json!({ "body": "fresh" })));
    }

    #[test]
    fn content_of_new_arrivals_is_fetched() {
        let store = Arc::new(MemoryBlobStore::new(10));
        store.insert(
            "m1",
            "Subject: Your invoice\r\n\r\nThe invoice is attached.\r\n",
            Utc::now(),
        );
        store.insert("m2", "Subject: hello\r\n\r\nhi\r\n", Utc::now());
        let mut mb = set_up();
        mb.set_blob_store(Arc::clone(&store) as Arc<dyn BlobStore>);
        assert_eq!(2, mb.refresh_inbox().unwrap());

        // Queries not looking at content leave the messages unfetched
        let query = Query::from_json(&json!({ "uid": "1:*" })).unwrap();
        assert_eq!(2, mb.search("INBOX", &query).unwrap().len());
        assert!(mb.folder("INBOX").unwrap().messages[0].raw().is_none());

        let mut search = |query: Value| -> Vec<u32> {
            let query = Query::from_json(&query).unwrap();
            mb.search("INBOX", &query)
                .unwrap()
                .into_iter()
                .map(|h| h.uid.get())
                .collect()
        };
        assert_eq!(vec![1], search(json!({ "body": "invoice" })));
        assert_eq!(vec![1], search(json!({ "text": "INVOICE" })));
        assert_eq!(
            vec![1],
            search(json!({ "headers": { "subject": "invoice" } }))
        );
        assert_eq!(vec![1, 2], search(json!({ "size": { "gt": 5 } })));
    }

    #[test]
    fn unfetchable_content_does_not_match() {
        let store = Arc::new(MemoryBlobStore::new(10));
        store.insert("m1", "Subject: a\r\n\r\nneedle\r\n", Utc::now());
        store.insert("m2", "Subject: b\r\n\r\nneedle\r\n", Utc::now());
        let mut mb = set_up();
        mb.set_blob_store(Arc::clone(&store) as Arc<dyn BlobStore>);
        mb.refresh_inbox().unwrap();
        store.remove("m1");

        let query = Query::from_json(&json!({ "body": "needle" })).unwrap();
        let found = mb.search("INBOX", &query).unwrap();
        assert_eq!(vec![Uid::u(2)], found.iter().map(|h| h.uid).collect::<Vec<_>>());
    }

    #[test]
    fn concurrent_searches() {
        let mb = Arc::new(set_up_corpus());
        let results = (0..32)
            .into_par_iter()
            .map(|i| {
                let query = if 0 == i % 2 {
                    json!({ "body": "notes" })
                } else {
                    json!({ "headers": { "subject": "greetings" } })
                };
                (i, uids(&mb, query))
            })
            .collect::<Vec<_>>();

        for (i, found) in results {
            assert_eq!(if 0 == i % 2 { vec![2] } else { vec![1] }, found);
        }
    }
}
