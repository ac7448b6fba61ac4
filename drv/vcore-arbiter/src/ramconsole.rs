// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A [`Recorder`] that packs the request table into two words, for boards
//! that keep them somewhere that survives a reset.
//!
//! The OPP word holds one nibble per kicker at `4 * index`, `0xF` meaning no
//! request. The status word holds the last kicker in bits 8..12, what it
//! asked for in bits 12..16 (same encoding) and the resolved target in bits
//! 0..4.

use core::fmt;

use crate::Recorder;
use drv_vcore_api::{Kicker, Opp};

const UNREQ: u64 = 0xF;
const NIBBLE: u64 = 0xF;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RamConsole {
    opp: u64,
    status: u32,
}

impl Default for RamConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl RamConsole {
    pub const fn new() -> Self {
        Self {
            opp: u64::MAX,
            status: 0,
        }
    }

    pub fn opp_word(&self) -> u64 {
        self.opp
    }

    pub fn status_word(&self) -> u32 {
        self.status
    }

    /// Decodes one kicker's slot back out of the OPP word.
    pub fn entry(&self, kicker: Kicker) -> Option<Opp> {
        let nibble = (self.opp >> shift(kicker)) & NIBBLE;
        Opp::from_level(nibble as u8)
    }

    /// The last recorded kicker and its request.
    pub fn last(&self) -> (Option<Kicker>, Option<Opp>) {
        let kicker = Kicker::from_u8(((self.status >> 8) & 0xF) as u8);
        let opp = Opp::from_level(((self.status >> 12) & 0xF) as u8);
        (kicker, opp)
    }
}

fn shift(kicker: Kicker) -> u32 {
    4 * kicker.index() as u32
}

fn nibble(opp: Option<Opp>) -> u64 {
    opp.map_or(UNREQ, |o| u64::from(o.level()))
}

impl Recorder for RamConsole {
    fn record(
        &mut self,
        kicker: Kicker,
        requested: Option<Opp>,
        resolved: Opp,
    ) {
        let s = shift(kicker);
        self.opp = (self.opp & !(NIBBLE << s)) | nibble(requested) << s;

        let req = nibble(requested) as u32;
        self.status &= !0xFF0F;
        self.status |= req << 12
            | (kicker.index() as u32) << 8
            | u32::from(resolved.level());
    }

    fn reset(&mut self) {
        self.opp = u64::MAX;
    }

    fn dump(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        writeln!(out, "[ram]vcore_dvfs_opp   : {:#x}", self.opp)?;
        writeln!(out, "[ram]vcore_dvfs_status: {:#x}", self.status)
    }
}
