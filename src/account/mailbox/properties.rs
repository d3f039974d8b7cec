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

use log::debug;

use super::defs::*;
use super::range::resolve_nonempty;
use crate::account::model::*;
use crate::support::error::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PropertyOp {
    Add,
    Remove,
    Replace,
}

impl Mailbox {
    /// Merge `properties` into those of the selected messages.
    ///
    /// See `Property::merge`.
    pub fn add_properties(
        &mut self,
        path: &str,
        range: &str,
        mode: RangeMode,
        properties: &BTreeMap<String, Property>,
    ) -> Result<Vec<PropertyUpdate>, Error> {
        self.edit_properties(path, range, mode, properties, PropertyOp::Add)
    }

    /// Remove the given values from the properties of the selected messages.
    ///
    /// Each named property is left as a (possibly empty) list.
    pub fn remove_properties(
        &mut self,
        path: &str,
        range: &str,
        mode: RangeMode,
        properties: &BTreeMap<String, Property>,
    ) -> Result<Vec<PropertyUpdate>, Error> {
        self.edit_properties(path, range, mode, properties, PropertyOp::Remove)
    }

    /// Overwrite the named properties of the selected messages.
    pub fn replace_properties(
        &mut self,
        path: &str,
        range: &str,
        mode: RangeMode,
        properties: &BTreeMap<String, Property>,
    ) -> Result<Vec<PropertyUpdate>, Error> {
        self.edit_properties(
            path,
            range,
            mode,
            properties,
            PropertyOp::Replace,
        )
    }

    fn edit_properties(
        &mut self,
        path: &str,
        range: &str,
        mode: RangeMode,
        properties: &BTreeMap<String, Property>,
        op: PropertyOp,
    ) -> Result<Vec<PropertyUpdate>, Error> {
        let folder = self.folder_mut(path)?;
        let ixs = resolve_nonempty(&folder.messages, range, mode)?;

        let mut updates = Vec::with_capacity(ixs.len());
        for ix in ixs {
            let message = &mut folder.messages[ix];
            for (name, value) in properties {
                let new = match op {
                    PropertyOp::Add => {
                        Property::merge(message.properties.remove(name), value)
                    },
                    PropertyOp::Remove => {
                        Property::without(message.properties.get(name), value)
                    },
                    PropertyOp::Replace => value.clone(),
                };
                message.properties.insert(name.clone(), new);
            }

            updates.push(PropertyUpdate {
                index: Seqnum::from_index(ix),
                uid: message.uid(),
                properties: message.properties.clone(),
            });
        }

        debug!(
            "{} {:?} properties {:?} on {} message(s) in {}",
            self.log_prefix,
            op,
            properties.keys().collect::<Vec<_>>(),
            updates.len(),
            path
        );
        self.reindex();
        Ok(updates)
    }
}

#[cfg(test)]
mod test {
    use std::collections::BTreeMap;

    use super::super::test_prelude::*;

    fn props(entries: &[(&str, Property)]) -> BTreeMap<String, Property> {
        entries
            .iter()
            .map(|&(k, ref v)| (k.to_owned(), v.clone()))
            .collect()
    }

    fn single(s: &str) -> Property {
        Property::Single(s.to_owned())
    }

    fn list(v: &[&str]) -> Property {
        Property::List(flags(v))
    }

    #[test]
    fn add_remove_replace() {
        let mut mb = set_up();
        simple_append(&mut mb, "INBOX");
        simple_append(&mut mb, "INBOX");

        let updates = mb
            .add_properties(
                "INBOX",
                "1",
                RangeMode::Index,
                &props(&[("label", single("work"))]),
            )
            .unwrap();
        assert_eq!(1, updates.len());
        assert_eq!(Uid::u(1), updates[0].uid);
        assert_eq!(props(&[("label", single("work"))]), updates[0].properties);

        let updates = mb
            .add_properties(
                "INBOX",
                "1",
                RangeMode::Uid,
                &props(&[("label", list(&["urgent", "later"]))]),
            )
            .unwrap();
        assert_eq!(
            props(&[("label", list(&["work", "urgent", "later"]))]),
            updates[0].properties
        );

        let updates = mb
            .remove_properties(
                "INBOX",
                "1",
                RangeMode::Index,
                &props(&[("label", single("urgent"))]),
            )
            .unwrap();
        assert_eq!(
            props(&[("label", list(&["work", "later"]))]),
            updates[0].properties
        );

        let updates = mb
            .replace_properties(
                "INBOX",
                "1:*",
                RangeMode::Index,
                &props(&[("label", single("home"))]),
            )
            .unwrap();
        assert_eq!(2, updates.len());
        for update in updates {
            assert_eq!(props(&[("label", single("home"))]), update.properties);
        }
    }

    #[test]
    fn remove_absent_property() {
        let mut mb = set_up();
        simple_append(&mut mb, "INBOX");
        let updates = mb
            .remove_properties(
                "INBOX",
                "1",
                RangeMode::Index,
                &props(&[("label", single("x"))]),
            )
            .unwrap();
        assert_eq!(props(&[("label", list(&[]))]), updates[0].properties);

        assert_matches!(
            Err(Error::NxMessage),
            mb.remove_properties(
                "INBOX",
                "2",
                RangeMode::Uid,
                &props(&[("label", single("x"))]),
            )
        );
    }
}
