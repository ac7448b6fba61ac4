// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Carrying arbiter state across a retentive restart.
//!
//! Before the system drops into a low-power state that keeps RAM but resets
//! the cores, the owner writes a [`RetainedImage`] somewhere that survives,
//! and feeds it back through [`Arbiter::resume`] on the way up. The image
//! holds the profile and request table. It does not hold the feature-enable
//! flag: the platform has to re-enable the arbiter after a restart, because
//! the rail may not be where the table says it is.

use hubpack::SerializedSize;
use serde::{Deserialize, Serialize};

use crate::trace::Trace;
use crate::{
    Arbiter, Calibration, HubpackError, Platform, Profile, Recorder, Registry,
    TransitionDriver,
};
use drv_vcore_api::{Opp, NUM_KICKERS};

#[derive(
    Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, SerializedSize,
)]
pub struct RetainedImage {
    pub profile: Profile,
    pub table: [Option<Opp>; NUM_KICKERS],
}

impl RetainedImage {
    /// Serializes into `buf`, which should be at least
    /// `RetainedImage::MAX_SIZE` bytes. Returns the number of bytes used.
    pub fn write(&self, buf: &mut [u8]) -> Result<usize, HubpackError> {
        hubpack::serialize(buf, self)
    }

    pub fn read(buf: &[u8]) -> Result<Self, HubpackError> {
        let (image, _rest) = hubpack::deserialize::<Self>(buf)?;
        Ok(image)
    }
}

impl<D, P, R, C> Arbiter<D, P, R, C>
where
    D: TransitionDriver,
    P: Platform,
    R: Recorder,
    C: Calibration,
{
    pub fn snapshot(&self) -> RetainedImage {
        let guard = self.state.lock();
        RetainedImage {
            profile: guard.engine.profile,
            table: guard.engine.registry.to_table(),
        }
    }

    /// Writes the current state into `buf`.
    pub fn retain(&self, buf: &mut [u8]) -> Result<usize, HubpackError> {
        self.snapshot().write(buf)
    }

    /// Restores state written by [`Arbiter::retain`]. The arbiter comes back
    /// disabled whatever it was before.
    pub fn resume(&self, buf: &[u8]) -> Result<(), HubpackError> {
        let image = RetainedImage::read(buf)?;

        let mut guard = self.state.lock();
        let engine = &mut guard.engine;
        engine.profile = image.profile;
        engine.registry = Registry::from_table(image.table);
        engine.feature_enabled = false;
        engine.trace(Trace::Resumed);
        Ok(())
    }
}
