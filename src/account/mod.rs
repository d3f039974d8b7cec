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

//! Per-user mail storage.
//!
//! A user's mail lives in a bucket of a `blob::BlobStore`: one object per
//! delivered message, plus a JSON snapshot of the folder tree. The
//! `mailbox::Mailbox` type holds that tree in memory and implements every
//! operation on it.

pub mod blob;
pub mod mailbox;
pub mod mailbox_path;
pub mod model;
