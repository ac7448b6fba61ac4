// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Common types for the vcore DVFS arbiter.
//!
//! This crate works on both the host and the embedded system, so it can be
//! used in host-side tests and in build scripts that need to name kickers and
//! operating points.

#![cfg_attr(not(test), no_std)]

use enum_map::Enum;
use hubpack::SerializedSize;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive as _;
use serde::{Deserialize, Serialize};
use static_assertions::{const_assert, const_assert_eq};

/// Number of kicker identities known to the arbiter.
pub const NUM_KICKERS: usize = 12;

const_assert_eq!(NUM_KICKERS, <Kicker as Enum>::LENGTH);
// `KickerSet` is a single word.
const_assert!(NUM_KICKERS <= 32);

/// A requester of a minimum operating point on the vcore rail.
///
/// The discriminant is the kicker's index in the request table, and is
/// stable: the RAM console record and the debug masks are laid out by it.
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    Hash,
    Enum,
    FromPrimitive,
    Serialize,
    Deserialize,
    SerializedSize,
)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum Kicker {
    /// Multimedia (display, video codec).
    Mm,
    /// Memory bandwidth monitor.
    EmiBw,
    Sdio,
    Usb,
    Gpu,
    /// Performance service (boost hints from userspace).
    Perf,
    /// The boot sequencer; seeded by `init` from the bootstrap OPP.
    Bootup,
    /// eMMC tuning. Calibration kickers are normally routed through the
    /// calibration path rather than the request table.
    AutokEmmc,
    AutokSdio,
    AutokSd,
    /// Debug interface.
    Sysfs,
    /// Debug "force" identity: never deduplicated.
    SysfsX,
}

impl Kicker {
    pub const ALL: [Kicker; NUM_KICKERS] = [
        Kicker::Mm,
        Kicker::EmiBw,
        Kicker::Sdio,
        Kicker::Usb,
        Kicker::Gpu,
        Kicker::Perf,
        Kicker::Bootup,
        Kicker::AutokEmmc,
        Kicker::AutokSdio,
        Kicker::AutokSd,
        Kicker::Sysfs,
        Kicker::SysfsX,
    ];

    /// The identity that always bypasses request deduplication.
    pub const FORCE: Kicker = Kicker::SysfsX;

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_u8(raw: u8) -> Option<Self> {
        <Self as num_traits::FromPrimitive>::from_u8(raw)
    }

    /// Name used on the debug surface.
    pub const fn name(self) -> &'static str {
        match self {
            Kicker::Mm => "KIR_MM",
            Kicker::EmiBw => "KIR_EMIBW",
            Kicker::Sdio => "KIR_SDIO",
            Kicker::Usb => "KIR_USB",
            Kicker::Gpu => "KIR_GPU",
            Kicker::Perf => "KIR_PERF",
            Kicker::Bootup => "KIR_BOOTUP",
            Kicker::AutokEmmc => "KIR_AUTOK_EMMC",
            Kicker::AutokSdio => "KIR_AUTOK_SDIO",
            Kicker::AutokSd => "KIR_AUTOK_SD",
            Kicker::Sysfs => "KIR_SYSFS",
            Kicker::SysfsX => "KIR_SYSFSX",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

/// An arbitration group. Kickers only compete with other kickers in the
/// same group.
#[derive(
    Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum KickerGroup {
    #[default]
    Vcore,
    Ddr,
}

/// An operating performance point, ordered from lowest power to highest
/// performance.
///
/// "No request" is not an `Opp`: the request table holds `Option<Opp>`, and
/// a request for `None` is a release.
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    FromPrimitive,
    Serialize,
    Deserialize,
    SerializedSize,
)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Opp {
    Opp0 = 0,
    Opp1 = 1,
    Opp2 = 2,
    Opp3 = 3,
}

/// A raw OPP value that is neither a level nor the release code.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct InvalidOpp(pub i32);

impl Opp {
    pub const NUM_OPP: usize = 4;
    pub const LOWEST: Opp = Opp::Opp0;
    pub const HIGHEST: Opp = Opp::Opp3;

    /// Raw code for a release on the debug surface.
    pub const RELEASE_CODE: i32 = -1;

    pub const fn level(self) -> u8 {
        self as u8
    }

    pub fn from_level(level: u8) -> Option<Self> {
        Self::from_u8(level)
    }

    /// Decodes a raw request value: `-1` is a release, `0..NUM_OPP` a level.
    pub fn from_request_code(raw: i32) -> Result<Option<Self>, InvalidOpp> {
        if raw == Self::RELEASE_CODE {
            return Ok(None);
        }
        Self::from_i32(raw).map(Some).ok_or(InvalidOpp(raw))
    }

    pub fn request_code(opp: Option<Self>) -> i32 {
        opp.map_or(Self::RELEASE_CODE, |o| i32::from(o.level()))
    }
}

/// A set of kickers, one bit per kicker index.
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    Eq,
    PartialEq,
    Serialize,
    Deserialize,
    SerializedSize,
)]
pub struct KickerSet {
    bits: u32,
}

impl KickerSet {
    pub const EMPTY: Self = Self { bits: 0 };
    pub const ALL: Self = Self {
        bits: (1 << NUM_KICKERS) - 1,
    };

    /// Builds a set from raw bits, dropping bits that name no kicker.
    pub const fn from_bits_truncate(bits: u32) -> Self {
        Self {
            bits: bits & Self::ALL.bits,
        }
    }

    pub const fn bits(self) -> u32 {
        self.bits
    }

    /// `const` builder, for tables and initializers.
    pub const fn with(self, kicker: Kicker) -> Self {
        Self {
            bits: self.bits | 1 << kicker as u32,
        }
    }

    pub const fn contains(self, kicker: Kicker) -> bool {
        self.bits & 1 << kicker as u32 != 0
    }

    pub fn insert(&mut self, kicker: Kicker) {
        *self = self.with(kicker);
    }

    pub fn remove(&mut self, kicker: Kicker) {
        self.bits &= !(1 << kicker as u32);
    }

    pub const fn is_empty(self) -> bool {
        self.bits == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Kicker> {
        Kicker::ALL.into_iter().filter(move |&k| self.contains(k))
    }
}

impl FromIterator<Kicker> for KickerSet {
    fn from_iter<I: IntoIterator<Item = Kicker>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, Self::with)
    }
}

/// Descriptor handed to the transition driver: who asked, what they asked
/// for, and where the rail should end up.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TransitionRequest {
    pub kicker: Kicker,
    pub requested: Option<Opp>,
    pub target: Opp,
}

/// Why a request was stopped before it reached the hardware.
///
/// None of these are faults; callers are expected to tolerate them.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Enum)]
pub enum Rejection {
    /// The fixed high-performance override is in force.
    PermanentlyDisabled,
    /// The feature is disabled or initialization has not completed.
    NotReady,
    /// Another kicker holds the calibration lock.
    LockedByOther,
    /// The kicker is in the request mask.
    Masked,
    /// The kicker asked for what it already had.
    Unchanged,
    /// A calibration kicker tried to unlock a rail it had not locked.
    NotLocked,
}

/// The phase of a two-step transition that failed.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Enum)]
pub enum TransitionFault {
    /// Step one: raising or lowering the voltage.
    VoltageStep,
    /// Step two: retuning the DRAM/bus frequency.
    FrequencyStep,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ArbError {
    Rejected(Rejection),
    Transition(TransitionFault),
}

impl ArbError {
    /// The collapsed raw result code: `-1` for any rejection, `-2` and `-3`
    /// for the voltage and frequency steps.
    pub fn code(self) -> i32 {
        match self {
            ArbError::Rejected(_) => -1,
            ArbError::Transition(TransitionFault::VoltageStep) => -2,
            ArbError::Transition(TransitionFault::FrequencyStep) => -3,
        }
    }

    pub fn rejection(self) -> Option<Rejection> {
        match self {
            ArbError::Rejected(r) => Some(r),
            ArbError::Transition(_) => None,
        }
    }
}

impl From<Rejection> for ArbError {
    fn from(r: Rejection) -> Self {
        ArbError::Rejected(r)
    }
}

impl From<TransitionFault> for ArbError {
    fn from(f: TransitionFault) -> Self {
        ArbError::Transition(f)
    }
}

/// Successful request outcomes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// The transition driver completed the transition.
    Done,
    /// The bootstrap store took the request before initialization finished;
    /// nothing was sent to hardware.
    Deferred,
}

/// Whether callers should bother issuing requests at all.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Status {
    /// Not supported on this platform, or permanently overridden.
    Disabled,
    Ready,
    /// Supported, but initialization has not finished.
    NotYetReady,
}

impl Status {
    pub fn code(self) -> i32 {
        match self {
            Status::Disabled => -1,
            Status::NotYetReady => 0,
            Status::Ready => 1,
        }
    }
}
