// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The gates a request must pass before it may reach the request table.
//!
//! The order matters and is fixed:
//!
//! 1. fixed override
//! 2. pre-init handoff to the bootstrap store
//! 3. readiness
//! 4. calibration routing
//! 5. calibration lock
//! 6. request mask
//! 7. no-op suppression
//!
//! The first gate with an opinion wins.

use crate::engine::Engine;
use crate::trace::Trace;
use crate::{Calibration, Platform};
use drv_vcore_api::{Kicker, Opp, Rejection};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Verdict {
    /// Store the request and arbitrate.
    Proceed,
    /// The bootstrap store took the request.
    Deferred,
    /// Route to the calibration path.
    Calibrate { lock: bool },
    Reject(Rejection),
}

impl Engine {
    pub(crate) fn evaluate<P: Platform, C: Calibration>(
        &mut self,
        platform: &mut P,
        calibration: &C,
        kicker: Kicker,
        opp: Option<Opp>,
    ) -> Verdict {
        if self.profile.fixed_override {
            self.feature_enabled = false;
            return Verdict::Reject(
                self.reject(kicker, Rejection::PermanentlyDisabled),
            );
        }

        if platform.feature_supported() && !self.profile.init_done {
            self.trace_for(kicker, Trace::EarlyRequest(kicker, opp));
            if platform.claim_pre_init_request(kicker, opp) {
                return Verdict::Deferred;
            }
        }

        if !self.feature_enabled || !self.profile.init_done {
            return Verdict::Reject(self.reject(kicker, Rejection::NotReady));
        }

        if calibration.is_calibration_target(kicker) {
            return Verdict::Calibrate {
                lock: calibration.wants_lock(kicker, opp),
            };
        }

        if self
            .profile
            .calibration_owner
            .is_some_and(|owner| owner != kicker)
        {
            return Verdict::Reject(
                self.reject(kicker, Rejection::LockedByOther),
            );
        }

        if self.profile.request_mask.contains(kicker) {
            if opp.is_none() {
                self.registry.set(kicker, None);
            }
            return Verdict::Reject(self.reject(kicker, Rejection::Masked));
        }

        if kicker != Kicker::FORCE && self.registry.get(kicker) == opp {
            return Verdict::Reject(self.reject(kicker, Rejection::Unchanged));
        }

        Verdict::Proceed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Config, NoCalibration};
    use drv_vcore_api::KickerSet;

    struct Plat {
        supported: bool,
        claims: bool,
    }

    impl Platform for Plat {
        fn feature_supported(&self) -> bool {
            self.supported
        }

        fn initial_opp(&self) -> Option<Opp> {
            None
        }

        fn clear_initial_opp(&mut self) {}

        fn claim_pre_init_request(
            &mut self,
            _kicker: Kicker,
            _opp: Option<Opp>,
        ) -> bool {
            self.claims
        }
    }

    /// Treats the eMMC tuner as the only calibration kicker; any level
    /// request is a lock.
    struct Emmc;

    impl Calibration for Emmc {
        fn is_calibration_target(&self, kicker: Kicker) -> bool {
            kicker == Kicker::AutokEmmc
        }

        fn wants_lock(&self, _kicker: Kicker, opp: Option<Opp>) -> bool {
            opp.is_some()
        }

        fn start_calibration_cycle(&self) {}
    }

    fn plat() -> Plat {
        Plat {
            supported: true,
            claims: false,
        }
    }

    fn ready() -> Engine {
        let mut e = Engine::new(Config::DEFAULT);
        e.feature_enabled = true;
        e.profile.init_done = true;
        e
    }

    fn eval(e: &mut Engine, kicker: Kicker, opp: Option<Opp>) -> Verdict {
        e.evaluate(&mut plat(), &NoCalibration, kicker, opp)
    }

    #[test]
    fn fixed_override_beats_everything() {
        let mut e = ready();
        e.profile.fixed_override = true;
        e.profile.request_mask = KickerSet::ALL;

        assert_eq!(
            eval(&mut e, Kicker::Mm, Some(Opp::Opp1)),
            Verdict::Reject(Rejection::PermanentlyDisabled)
        );
        assert!(!e.feature_enabled);
    }

    #[test]
    fn early_request_can_be_claimed() {
        let mut e = Engine::new(Config::DEFAULT);
        let mut p = Plat {
            supported: true,
            claims: true,
        };
        let v =
            e.evaluate(&mut p, &NoCalibration, Kicker::Usb, Some(Opp::Opp2));
        assert_eq!(v, Verdict::Deferred);
        assert!(e
            .trace
            .contains(&Trace::EarlyRequest(Kicker::Usb, Some(Opp::Opp2))));
    }

    #[test]
    fn unclaimed_early_request_is_not_ready() {
        let mut e = Engine::new(Config::DEFAULT);
        assert_eq!(
            eval(&mut e, Kicker::Usb, Some(Opp::Opp2)),
            Verdict::Reject(Rejection::NotReady)
        );

        // Unsupported platforms never offer the request at all.
        let mut p = Plat {
            supported: false,
            claims: true,
        };
        let v =
            e.evaluate(&mut p, &NoCalibration, Kicker::Usb, Some(Opp::Opp2));
        assert_eq!(v, Verdict::Reject(Rejection::NotReady));
    }

    #[test]
    fn disabled_feature_is_not_ready() {
        let mut e = ready();
        e.feature_enabled = false;
        assert_eq!(
            eval(&mut e, Kicker::Mm, Some(Opp::Opp1)),
            Verdict::Reject(Rejection::NotReady)
        );
    }

    #[test]
    fn calibration_kicker_is_routed() {
        let mut e = ready();
        // Even a masked calibration kicker gets through.
        e.profile.request_mask = KickerSet::ALL;
        let v = e.evaluate(
            &mut plat(),
            &Emmc,
            Kicker::AutokEmmc,
            Some(Opp::Opp3),
        );
        assert_eq!(v, Verdict::Calibrate { lock: true });
        let v = e.evaluate(&mut plat(), &Emmc, Kicker::AutokEmmc, None);
        assert_eq!(v, Verdict::Calibrate { lock: false });
    }

    #[test]
    fn lock_excludes_everyone_else() {
        let mut e = ready();
        e.profile.calibration_owner = Some(Kicker::AutokSd);
        assert_eq!(
            eval(&mut e, Kicker::Mm, Some(Opp::Opp1)),
            Verdict::Reject(Rejection::LockedByOther)
        );
        assert_eq!(
            eval(&mut e, Kicker::AutokSd, Some(Opp::Opp1)),
            Verdict::Proceed
        );
    }

    #[test]
    fn masked_release_clears_entry() {
        let mut e = ready();
        e.registry.set(Kicker::Usb, Some(Opp::Opp2));
        e.profile.request_mask = KickerSet::EMPTY.with(Kicker::Usb);

        assert_eq!(
            eval(&mut e, Kicker::Usb, Some(Opp::Opp3)),
            Verdict::Reject(Rejection::Masked)
        );
        assert_eq!(e.registry.get(Kicker::Usb), Some(Opp::Opp2));

        assert_eq!(
            eval(&mut e, Kicker::Usb, None),
            Verdict::Reject(Rejection::Masked)
        );
        assert_eq!(e.registry.get(Kicker::Usb), None);
    }

    #[test]
    fn repeat_is_unchanged_except_force() {
        let mut e = ready();
        e.registry.set(Kicker::Mm, Some(Opp::Opp1));
        e.registry.set(Kicker::FORCE, Some(Opp::Opp1));

        assert_eq!(
            eval(&mut e, Kicker::Mm, Some(Opp::Opp1)),
            Verdict::Reject(Rejection::Unchanged)
        );
        assert_eq!(eval(&mut e, Kicker::Mm, Some(Opp::Opp2)), Verdict::Proceed);
        assert_eq!(
            eval(&mut e, Kicker::FORCE, Some(Opp::Opp1)),
            Verdict::Proceed
        );
        // A fresh kicker releasing is also a no-op.
        assert_eq!(
            eval(&mut e, Kicker::Perf, None),
            Verdict::Reject(Rejection::Unchanged)
        );
    }
}
