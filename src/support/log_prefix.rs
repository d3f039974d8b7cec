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

use std::fmt;
use std::sync::{Arc, Mutex};

/// Text included at the start of every log statement concerning one mailbox.
///
/// Clones of a `LogPrefix` share the same underlying data, so the prefix can
/// be handed to helpers and updated later (e.g. once the bucket is known).
#[derive(Clone)]
pub struct LogPrefix {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Clone, Default)]
struct Inner {
    component: String,
    user: Option<String>,
    bucket: Option<String>,
}

impl LogPrefix {
    pub fn new(component: String) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                component,
                ..Inner::default()
            })),
        }
    }

    pub fn set_user(&self, user: String) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.user = Some(sanitise(user));
        }
    }

    pub fn set_bucket(&self, bucket: String) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.bucket = Some(sanitise(bucket));
        }
    }
}

impl fmt::Debug for LogPrefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "LogPrefix({})", self)
    }
}

impl fmt::Display for LogPrefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(_) => return write!(f, "?"),
        };

        write!(f, "{}", inner.component)?;
        match (&inner.user, &inner.bucket) {
            (None, None) => Ok(()),
            (Some(user), None) => write!(f, "[{}]", user),
            (None, Some(bucket)) => write!(f, "[bucket={}]", bucket),
            (Some(user), Some(bucket)) => {
                write!(f, "[{} bucket={}]", user, bucket)
            },
        }
    }
}

fn sanitise(mut s: String) -> String {
    s.retain(|c| !c.is_control());
    if let Some((truncate_len, _)) = s.char_indices().nth(64) {
        s.truncate(truncate_len);
    }

    s
}
