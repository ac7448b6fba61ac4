// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::{Config, Registry};
use drv_vcore_api::{KickerGroup, KickerSet, Opp};

/// Computes the operating point a group must run at: the highest-performance
/// active request among the group's unmasked kickers, or the lowest-power
/// point if nobody in the group is asking for anything.
///
/// This runs on every accepted request with the arbiter lock held, so it is a
/// single pass over the table and never allocates.
pub fn resolve(
    registry: &Registry,
    config: &Config,
    mask: KickerSet,
    group: KickerGroup,
) -> Opp {
    registry
        .iter()
        .filter(|&(k, _)| config.group_of(k) == group && !mask.contains(k))
        .filter_map(|(_, opp)| opp)
        .max()
        .unwrap_or(Opp::LOWEST)
}
