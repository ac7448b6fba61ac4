// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Arbiter event trace and counters.
//!
//! The trace is a small ring of [`Trace`] events kept inside the arbiter
//! state, so it is covered by the same lock as everything else and can be
//! read back through [`crate::Arbiter::trace`] or a debugger. As with the
//! task ring buffers elsewhere in the system, recording the same event twice
//! in a row bumps the count on the newest slot instead of taking another one,
//! so a kicker hammering the same rejected request costs one slot.
//!
//! The counters never wrap around and never lose history; they are the thing
//! to look at when the ring has rolled over.

use drv_vcore_api::{Kicker, KickerSet, Opp, Rejection, TransitionFault};
use enum_map::EnumMap;

/// Number of slots in the arbiter's trace ring.
pub const TRACE_DEPTH: usize = 32;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Trace {
    None,
    Init {
        feature_enabled: bool,
        init_done: bool,
    },
    BootOpp(Opp),
    /// A request arrived before initialization finished.
    EarlyRequest(Kicker, Option<Opp>),
    Rejected(Kicker, Rejection),
    Transition {
        kicker: Kicker,
        requested: Option<Opp>,
        target: Opp,
        current: Option<Opp>,
    },
    TransitionFailed(Kicker, TransitionFault),
    CalibrationLock(Kicker, bool),
    FixedOverride(Opp),
    FeatureEnable(bool),
    RequestMask(KickerSet),
    LogMask(KickerSet),
    Resumed,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TraceEntry {
    pub generation: u16,
    pub count: u32,
    pub payload: Trace,
}

const EMPTY_ENTRY: TraceEntry = TraceEntry {
    generation: 0,
    count: 0,
    payload: Trace::None,
};

#[derive(Clone, Debug)]
pub struct TraceBuf<const N: usize> {
    last: Option<usize>,
    buffer: [TraceEntry; N],
}

impl<const N: usize> Default for TraceBuf<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> TraceBuf<N> {
    pub const fn new() -> Self {
        Self {
            last: None,
            buffer: [EMPTY_ENTRY; N],
        }
    }

    pub fn record(&mut self, payload: Trace) {
        let last = self.last.unwrap_or(usize::MAX);

        if let Some(ent) = self.buffer.get_mut(last) {
            if ent.payload == payload {
                if let Some(count) = ent.count.checked_add(1) {
                    ent.count = count;
                    return;
                }
            }
        }

        // usize::MAX wraps to slot 0 on the first insertion.
        let ndx = match last.wrapping_add(1) {
            n if n >= N => 0,
            n => n,
        };
        let Some(ent) = self.buffer.get_mut(ndx) else {
            // Zero-sized ring.
            return;
        };
        *ent = TraceEntry {
            generation: ent.generation.wrapping_add(1),
            count: 1,
            payload,
        };
        self.last = Some(ndx);
    }

    /// The most recently recorded entry.
    pub fn last(&self) -> Option<&TraceEntry> {
        self.buffer.get(self.last?)
    }

    /// Entries that have been written, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &TraceEntry> + '_ {
        let start = self.last.map_or(0, |l| l + 1);
        (0..N)
            .map(move |i| &self.buffer[(start + i) % N])
            .filter(|e| e.count != 0)
    }

    /// Whether `payload` appears anywhere in the ring.
    pub fn contains(&self, payload: &Trace) -> bool {
        self.iter().any(|e| e.payload == *payload)
    }
}

/// Running totals of everything that kept a request away from hardware, and
/// of what happened to the ones that got there.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Counters {
    pub rejections: EnumMap<Rejection, u32>,
    pub faults: EnumMap<TransitionFault, u32>,
    pub transitions: u32,
}

impl Counters {
    pub(crate) fn reject(&mut self, r: Rejection) {
        self.rejections[r] = self.rejections[r].saturating_add(1);
    }

    pub(crate) fn fault(&mut self, f: TransitionFault) {
        self.faults[f] = self.faults[f].saturating_add(1);
    }

    pub(crate) fn transition(&mut self) {
        self.transitions = self.transitions.saturating_add(1);
    }
}
