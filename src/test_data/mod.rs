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

//! Messages used as fixtures by tests throughout the crate.

/// A single-part message with a `Date` header and two recipients.
pub static SIMPLE: &[u8] = include_bytes!("simple.eml");

/// A `multipart/mixed` message holding a `multipart/alternative` part and an
/// attachment.
pub static NESTED: &[u8] = include_bytes!("nested.eml");

/// A single-part message without a `Date` header.
pub static UNDATED: &[u8] = include_bytes!("undated.eml");
