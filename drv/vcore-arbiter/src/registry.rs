// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The kicker request table.
//!
//! One slot per kicker holding its last stored request. The table does no
//! locking of its own; it lives inside the arbiter's state and is only
//! touched with the arbiter lock held.

use drv_vcore_api::{Kicker, Opp, NUM_KICKERS};
use enum_map::EnumMap;

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Registry {
    table: EnumMap<Kicker, Option<Opp>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kicker: Kicker) -> Option<Opp> {
        self.table[kicker]
    }

    pub fn set(&mut self, kicker: Kicker, opp: Option<Opp>) {
        self.table[kicker] = opp;
    }

    /// Walks every kicker in index order, active or not.
    pub fn iter(&self) -> impl Iterator<Item = (Kicker, Option<Opp>)> + '_ {
        self.table.iter().map(|(k, &opp)| (k, opp))
    }

    /// Flattens the table by kicker index, for the retention image.
    pub fn to_table(&self) -> [Option<Opp>; NUM_KICKERS] {
        let mut table = [None; NUM_KICKERS];
        for (k, opp) in self.iter() {
            table[k.index()] = opp;
        }
        table
    }

    pub fn from_table(table: [Option<Opp>; NUM_KICKERS]) -> Self {
        let mut r = Self::new();
        for k in Kicker::ALL {
            r.set(k, table[k.index()]);
        }
        r
    }
}
