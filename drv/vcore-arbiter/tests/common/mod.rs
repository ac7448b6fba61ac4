// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stand-ins for the board collaborators, shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use drv_vcore_api::{Kicker, KickerSet, Opp, TransitionFault, TransitionRequest};
use drv_vcore_arbiter::{
    Arbiter, Calibration, Config, Platform, RamConsole, TransitionDriver,
};

/// Records everything it is asked to do and tracks where the rail is.
#[derive(Debug, Default)]
pub struct MockDriver {
    pub applied: Vec<TransitionRequest>,
    pub pinned: Option<Opp>,
    pub rail: Option<Opp>,
    /// Fails the next transition with this fault.
    pub fail_next: Option<TransitionFault>,
}

impl TransitionDriver for MockDriver {
    fn apply(
        &mut self,
        req: &TransitionRequest,
    ) -> Result<(), TransitionFault> {
        self.applied.push(*req);
        if let Some(fault) = self.fail_next.take() {
            return Err(fault);
        }
        self.rail = Some(req.target);
        Ok(())
    }

    fn pin(&mut self, opp: Opp) {
        self.pinned = Some(opp);
        self.rail = Some(opp);
    }

    fn current_opp(&self) -> Option<Opp> {
        self.rail
    }
}

#[derive(Debug)]
pub struct MockPlatform {
    pub supported: bool,
    pub boot_opp: Option<Opp>,
    pub claim_early: bool,
    pub claimed: Vec<(Kicker, Option<Opp>)>,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self {
            supported: true,
            boot_opp: None,
            claim_early: false,
            claimed: Vec::new(),
        }
    }
}

impl Platform for MockPlatform {
    fn feature_supported(&self) -> bool {
        self.supported
    }

    fn initial_opp(&self) -> Option<Opp> {
        self.boot_opp
    }

    fn clear_initial_opp(&mut self) {
        self.boot_opp = None;
    }

    fn claim_pre_init_request(
        &mut self,
        kicker: Kicker,
        opp: Option<Opp>,
    ) -> bool {
        if self.claim_early {
            self.claimed.push((kicker, opp));
        }
        self.claim_early
    }
}

/// The three storage tuners; a level locks, a release unlocks.
#[derive(Debug)]
pub struct MockCalibration {
    pub kickers: KickerSet,
    pub cycles: AtomicUsize,
}

impl Default for MockCalibration {
    fn default() -> Self {
        Self {
            kickers: [Kicker::AutokEmmc, Kicker::AutokSdio, Kicker::AutokSd]
                .into_iter()
                .collect(),
            cycles: AtomicUsize::new(0),
        }
    }
}

impl MockCalibration {
    pub fn cycles(&self) -> usize {
        self.cycles.load(Ordering::SeqCst)
    }
}

impl Calibration for MockCalibration {
    fn is_calibration_target(&self, kicker: Kicker) -> bool {
        self.kickers.contains(kicker)
    }

    fn wants_lock(&self, _kicker: Kicker, opp: Option<Opp>) -> bool {
        opp.is_some()
    }

    fn start_calibration_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::SeqCst);
    }
}

pub type TestArbiter =
    Arbiter<MockDriver, MockPlatform, RamConsole, MockCalibration>;

pub fn with_parts(config: Config, platform: MockPlatform) -> TestArbiter {
    Arbiter::with_parts(
        config,
        MockDriver::default(),
        platform,
        RamConsole::new(),
        MockCalibration::default(),
    )
}

/// Fresh arbiter on the stock configuration, not yet initialized.
pub fn arbiter() -> TestArbiter {
    with_parts(Config::DEFAULT, MockPlatform::default())
}

/// Initialized and enabled, with nothing in the request table.
pub fn ready() -> TestArbiter {
    let a = arbiter();
    a.init(true, true, None);
    a
}

pub fn targets(a: &TestArbiter) -> Vec<Opp> {
    a.with_driver(|d| d.applied.iter().map(|r| r.target).collect())
}

pub fn applied(a: &TestArbiter) -> usize {
    a.with_driver(|d| d.applied.len())
}
