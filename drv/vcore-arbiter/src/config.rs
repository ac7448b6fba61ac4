// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Static arbiter configuration.
//!
//! The image's configuration is generated by `build.rs` from the task's TOML
//! table and lands here as [`Config::BUILD`]. A `Config` can also be built by
//! hand, which is what host-side tests do.

use drv_vcore_api::{Kicker, KickerGroup, KickerSet, Opp, NUM_KICKERS};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// Arbitration group for each kicker, by kicker index.
    pub groups: [KickerGroup; NUM_KICKERS],
    /// Log mask installed when the profile is created.
    pub default_log_mask: KickerSet,
    /// OPP the rail is pinned to by the fixed override.
    pub pinned_opp: Opp,
}

include!(concat!(env!("OUT_DIR"), "/arbiter_config.rs"));

impl Config {
    /// Configuration generated from `HUBRIS_TASK_CONFIG` at build time.
    pub const BUILD: Config = BUILD_CONFIG;

    /// The stock configuration: one vcore group, GPU kept out of the trace,
    /// override pinned at the top of the ladder. Independent of the build
    /// environment.
    pub const DEFAULT: Config = Config {
        groups: [KickerGroup::Vcore; NUM_KICKERS],
        default_log_mask: KickerSet::EMPTY.with(Kicker::Gpu),
        pinned_opp: Opp::HIGHEST,
    };

    pub fn group_of(&self, kicker: Kicker) -> KickerGroup {
        self.groups[kicker.index()]
    }

    pub fn with_group(mut self, kicker: Kicker, group: KickerGroup) -> Self {
        self.groups[kicker.index()] = group;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::BUILD
    }
}
