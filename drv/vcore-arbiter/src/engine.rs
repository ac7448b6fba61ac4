// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Arbitration state and the pieces of the request path that touch
//! hardware.
//!
//! Everything in here runs with the arbiter lock held; nothing takes a lock
//! of its own.

use crate::trace::{Counters, Trace, TraceBuf, TRACE_DEPTH};
use crate::{resolve, Config, Registry, TransitionDriver};
use drv_vcore_api::{
    ArbError, Kicker, KickerGroup, KickerSet, Opp, Outcome, Rejection,
    TransitionRequest,
};
use hubpack::SerializedSize;
use serde::{Deserialize, Serialize};

/// The arbiter's policy record.
///
/// This is the part of the arbiter state that survives a retentive restart.
/// The feature-enable flag is not in here; see [`crate::RetainedImage`].
#[derive(
    Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, SerializedSize,
)]
pub struct Profile {
    pub init_done: bool,
    /// Initial OPP the platform passed to `init`.
    pub platform_opp: Option<Opp>,
    /// Kickers whose requests are refused.
    pub request_mask: KickerSet,
    /// Kickers whose trace entries are suppressed.
    pub log_mask: KickerSet,
    /// Calibration kicker currently holding the rail, if any.
    pub calibration_owner: Option<Kicker>,
    /// Set by the fixed high-performance override. Never cleared.
    pub fixed_override: bool,
}

impl Profile {
    pub const fn new(log_mask: KickerSet) -> Self {
        Self {
            init_done: false,
            platform_opp: None,
            request_mask: KickerSet::EMPTY,
            log_mask,
            calibration_owner: None,
            fixed_override: false,
        }
    }
}

pub(crate) struct Engine {
    pub config: Config,
    pub profile: Profile,
    pub feature_enabled: bool,
    pub registry: Registry,
    pub trace: TraceBuf<TRACE_DEPTH>,
    pub counters: Counters,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            profile: Profile::new(config.default_log_mask),
            feature_enabled: false,
            registry: Registry::new(),
            trace: TraceBuf::new(),
            counters: Counters::default(),
        }
    }

    pub fn trace(&mut self, t: Trace) {
        self.trace.record(t);
    }

    /// Records `t` unless `kicker` is in the log mask.
    pub fn trace_for(&mut self, kicker: Kicker, t: Trace) {
        if !self.profile.log_mask.contains(kicker) {
            self.trace.record(t);
        }
    }

    /// Counts a rejection and hands it back. Override and lock refusals are
    /// traced regardless of the log mask.
    pub fn reject(&mut self, kicker: Kicker, r: Rejection) -> Rejection {
        self.counters.reject(r);
        let t = Trace::Rejected(kicker, r);
        match r {
            Rejection::PermanentlyDisabled | Rejection::LockedByOther => {
                self.trace(t)
            }
            _ => self.trace_for(kicker, t),
        }
        r
    }

    pub fn resolve(&self, group: KickerGroup) -> Opp {
        resolve(
            &self.registry,
            &self.config,
            self.profile.request_mask,
            group,
        )
    }

    /// Hands `req` to the driver and reports what came back.
    pub fn apply<D: TransitionDriver>(
        &mut self,
        driver: &mut D,
        req: &TransitionRequest,
    ) -> Result<Outcome, ArbError> {
        let current = driver.current_opp();
        self.trace_for(
            req.kicker,
            Trace::Transition {
                kicker: req.kicker,
                requested: req.requested,
                target: req.target,
                current,
            },
        );

        match driver.apply(req) {
            Ok(()) => {
                self.counters.transition();
                Ok(Outcome::Done)
            }
            Err(fault) => {
                self.counters.fault(fault);
                self.trace(Trace::TransitionFailed(req.kicker, fault));
                Err(fault.into())
            }
        }
    }

    /// The calibration path. A lock pins the rail where the calibration
    /// kicker asked for; an unlock puts it back where the group resolves
    /// before letting go. Neither touches the request table. While one
    /// calibration kicker holds the lock, the others can neither take it nor
    /// drop it.
    pub fn calibrate<D: TransitionDriver>(
        &mut self,
        driver: &mut D,
        kicker: Kicker,
        opp: Option<Opp>,
        lock: bool,
    ) -> Result<Outcome, ArbError> {
        if self
            .profile
            .calibration_owner
            .is_some_and(|owner| owner != kicker)
        {
            return Err(self.reject(kicker, Rejection::LockedByOther).into());
        }

        if lock {
            self.profile.calibration_owner = Some(kicker);
            self.trace(Trace::CalibrationLock(kicker, true));
            let req = TransitionRequest {
                kicker,
                requested: opp,
                target: opp.unwrap_or(Opp::LOWEST),
            };
            return self.apply(driver, &req);
        }

        if self.profile.calibration_owner.is_none() {
            return Err(self.reject(kicker, Rejection::NotLocked).into());
        }

        let req = TransitionRequest {
            kicker,
            requested: opp,
            target: self.resolve(self.config.group_of(kicker)),
        };
        let r = self.apply(driver, &req);
        self.profile.calibration_owner = None;
        self.trace(Trace::CalibrationLock(kicker, false));
        r
    }
}
