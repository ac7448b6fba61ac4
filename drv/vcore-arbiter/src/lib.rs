// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Vcore operating-point arbiter.
//!
//! Many independent subsystems ("kickers") each want the shared vcore rail
//! at or above some operating point. The arbiter keeps the latest request
//! from each of them, filters requests through a fixed set of policy gates,
//! resolves what is left to one target per group (the highest request wins)
//! and drives the rail there through a [`TransitionDriver`].
//!
//! Transitions are slow and can fail halfway, so all of this happens under a
//! single lock that is held across the driver call: there is never more than
//! one transition in flight, and a caller that gets `Ok` back knows the rail
//! got where it was going.
//!
//! The arbiter is an ordinary value. Whoever owns the rail builds one with
//! the collaborators for the board and hands out `&Arbiter` to the kickers.

#![cfg_attr(not(test), no_std)]

mod config;
mod debug;
mod engine;
mod policy;
mod ramconsole;
mod registry;
mod resolve;
mod retention;
pub mod trace;

use core::fmt;

use drv_vcore_api::{
    ArbError, Kicker, KickerGroup, KickerSet, Opp, Outcome, Status,
    TransitionFault, TransitionRequest,
};
use spin::{Mutex, Once};

use crate::engine::Engine;
use crate::policy::Verdict;
use crate::trace::{Counters, Trace, TraceBuf, TRACE_DEPTH};

pub use crate::config::Config;
pub use crate::debug::DebugError;
pub use crate::engine::Profile;
pub use crate::ramconsole::RamConsole;
pub use crate::registry::Registry;
pub use crate::resolve::resolve;
pub use crate::retention::RetainedImage;
pub use hubpack::error::Error as HubpackError;

/// The two-step voltage/frequency sequencer underneath the arbiter.
pub trait TransitionDriver {
    /// Moves the rail to `req.target`. Called with the arbiter lock held.
    fn apply(&mut self, req: &TransitionRequest) -> Result<(), TransitionFault>;

    /// Pins the rail for the fixed override.
    fn pin(&mut self, opp: Opp);

    /// Where the rail is now, if the driver can tell.
    fn current_opp(&self) -> Option<Opp> {
        None
    }
}

/// Platform capability and the boot-time OPP store.
pub trait Platform {
    fn feature_supported(&self) -> bool;

    /// The OPP the boot stages left the rail at, if they recorded one.
    fn initial_opp(&self) -> Option<Opp>;

    fn clear_initial_opp(&mut self);

    fn take_initial_opp(&mut self) -> Option<Opp> {
        let opp = self.initial_opp();
        self.clear_initial_opp();
        opp
    }

    /// Offered every request that arrives before `init` finishes. Returning
    /// `true` takes responsibility for it.
    fn claim_pre_init_request(
        &mut self,
        _kicker: Kicker,
        _opp: Option<Opp>,
    ) -> bool {
        false
    }
}

/// The storage-tuning subsystem that needs the rail held still while it
/// calibrates.
pub trait Calibration {
    fn is_calibration_target(&self, kicker: Kicker) -> bool;

    /// Whether a request from a calibration kicker takes the lock (`true`) or
    /// drops it (`false`).
    fn wants_lock(&self, kicker: Kicker, opp: Option<Opp>) -> bool;

    /// Kicks off calibration after `init`. Called without the arbiter lock.
    fn start_calibration_cycle(&self);
}

/// For boards without calibration kickers.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoCalibration;

impl Calibration for NoCalibration {
    fn is_calibration_target(&self, _kicker: Kicker) -> bool {
        false
    }

    fn wants_lock(&self, _kicker: Kicker, _opp: Option<Opp>) -> bool {
        false
    }

    fn start_calibration_cycle(&self) {}
}

/// Crash-diagnostics sink. Must not block or fail; it runs under the lock on
/// every transition.
pub trait Recorder {
    fn record(&mut self, kicker: Kicker, requested: Option<Opp>, resolved: Opp);

    fn reset(&mut self);

    fn dump(&self, _out: &mut dyn fmt::Write) -> fmt::Result {
        Ok(())
    }
}

impl Recorder for () {
    fn record(&mut self, _: Kicker, _: Option<Opp>, _: Opp) {}

    fn reset(&mut self) {}
}

/// Told about every request on its way to the driver.
pub trait RequestObserver: Sync {
    fn on_request(&self, kicker: Kicker, opp: Option<Opp>);
}

struct State<D, P, R> {
    engine: Engine,
    driver: D,
    platform: P,
    recorder: R,
}

pub struct Arbiter<D, P, R = (), C = NoCalibration> {
    state: Mutex<State<D, P, R>>,
    calibration: C,
    observer: Once<&'static dyn RequestObserver>,
}

impl<D, P> Arbiter<D, P>
where
    D: TransitionDriver,
    P: Platform,
{
    pub fn new(config: Config, driver: D, platform: P) -> Self {
        Self::with_parts(config, driver, platform, (), NoCalibration)
    }
}

impl<D, P, R, C> Arbiter<D, P, R, C>
where
    D: TransitionDriver,
    P: Platform,
    R: Recorder,
    C: Calibration,
{
    pub fn with_parts(
        config: Config,
        driver: D,
        platform: P,
        recorder: R,
        calibration: C,
    ) -> Self {
        Self {
            state: Mutex::new(State {
                engine: Engine::new(config),
                driver,
                platform,
                recorder,
            }),
            calibration,
            observer: Once::new(),
        }
    }

    /// Asks for the kicker's group to run at `opp` or better; `None`
    /// withdraws the kicker's request.
    ///
    /// Blocks until any transition in progress has finished, then either
    /// refuses the request or stores it and drives the group to its new
    /// target. A stored request stays stored even if the transition fails.
    pub fn request(
        &self,
        kicker: Kicker,
        opp: Option<Opp>,
    ) -> Result<Outcome, ArbError> {
        let mut guard = self.state.lock();
        let State {
            engine,
            driver,
            platform,
            recorder,
        } = &mut *guard;

        match engine.evaluate(platform, &self.calibration, kicker, opp) {
            Verdict::Proceed => (),
            Verdict::Deferred => return Ok(Outcome::Deferred),
            Verdict::Reject(r) => return Err(r.into()),
            Verdict::Calibrate { lock } => {
                return engine.calibrate(driver, kicker, opp, lock);
            }
        }

        engine.registry.set(kicker, opp);
        let target = engine.resolve(engine.config.group_of(kicker));
        let req = TransitionRequest {
            kicker,
            requested: opp,
            target,
        };

        recorder.record(kicker, opp, target);
        if let Some(observer) = self.observer.get() {
            observer.on_request(kicker, opp);
        }

        engine.apply(driver, &req)
    }

    /// One-time bring-up, called by the platform once it knows whether the
    /// feature is usable. The feature stays off after a fixed override.
    pub fn init(
        &self,
        mut feature_enabled: bool,
        init_done: bool,
        initial_opp: Option<Opp>,
    ) {
        {
            let mut guard = self.state.lock();
            let State {
                engine,
                platform,
                recorder,
                ..
            } = &mut *guard;

            feature_enabled &= !engine.profile.fixed_override;
            engine.feature_enabled = feature_enabled;
            recorder.reset();

            if let Some(boot) = platform.initial_opp().or(initial_opp) {
                engine.registry.set(Kicker::Bootup, Some(boot));
                recorder.record(Kicker::Bootup, Some(boot), boot);
                engine.trace(Trace::BootOpp(boot));
            }

            engine.profile.platform_opp = initial_opp;
            engine.profile.init_done = init_done;
            engine.trace(Trace::Init {
                feature_enabled,
                init_done,
            });
        }

        if feature_enabled {
            self.calibration.start_calibration_cycle();
        }

        self.state.lock().platform.clear_initial_opp();
    }

    pub fn query_status(&self) -> Status {
        let guard = self.state.lock();
        let engine = &guard.engine;

        if engine.profile.fixed_override {
            Status::Disabled
        } else if engine.profile.init_done && engine.feature_enabled {
            Status::Ready
        } else if !guard.platform.feature_supported() {
            Status::Disabled
        } else {
            Status::NotYetReady
        }
    }

    /// Pins the rail at the configured OPP for good. Every later request is
    /// refused.
    pub fn force_permanent_override(&self) {
        let mut guard = self.state.lock();
        let State { engine, driver, .. } = &mut *guard;

        engine.profile.fixed_override = true;
        engine.profile.request_mask = KickerSet::ALL;
        engine.feature_enabled = false;

        let opp = engine.config.pinned_opp;
        driver.pin(opp);
        engine.trace(Trace::FixedOverride(opp));
    }

    pub fn fixed_override_active(&self) -> bool {
        self.state.lock().engine.profile.fixed_override
    }

    /// Installs the request observer. There is one slot; returns `false` if
    /// it was already taken.
    pub fn register_observer(
        &self,
        observer: &'static dyn RequestObserver,
    ) -> bool {
        let mut installed = false;
        self.observer.call_once(|| {
            installed = true;
            observer
        });
        installed
    }

    pub fn entry(&self, kicker: Kicker) -> Option<Opp> {
        self.state.lock().engine.registry.get(kicker)
    }

    /// Where `group` would resolve right now.
    pub fn resolved(&self, group: KickerGroup) -> Opp {
        self.state.lock().engine.resolve(group)
    }

    pub fn feature_enabled(&self) -> bool {
        self.state.lock().engine.feature_enabled
    }

    pub fn profile(&self) -> Profile {
        self.state.lock().engine.profile
    }

    pub fn config(&self) -> Config {
        self.state.lock().engine.config
    }

    pub fn trace(&self) -> TraceBuf<TRACE_DEPTH> {
        self.state.lock().engine.trace.clone()
    }

    pub fn counters(&self) -> Counters {
        self.state.lock().engine.counters.clone()
    }

    pub fn calibration(&self) -> &C {
        &self.calibration
    }

    pub fn with_driver<T>(&self, f: impl FnOnce(&mut D) -> T) -> T {
        f(&mut self.state.lock().driver)
    }

    pub fn with_platform<T>(&self, f: impl FnOnce(&mut P) -> T) -> T {
        f(&mut self.state.lock().platform)
    }

    pub fn with_recorder<T>(&self, f: impl FnOnce(&mut R) -> T) -> T {
        f(&mut self.state.lock().recorder)
    }
}
