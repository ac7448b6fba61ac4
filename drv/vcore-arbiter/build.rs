// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use drv_vcore_api::{Kicker, KickerSet, Opp};
use serde::Deserialize;
use std::fmt::Write as _;
use std::{env, fs, path::PathBuf};

/// The arbiter's task configuration. Everything is optional; an absent
/// `HUBRIS_TASK_CONFIG` yields the same image as an empty table.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct ArbiterConfig {
    /// Kickers that arbitrate in the DDR group rather than on vcore.
    #[serde(default)]
    ddr_kickers: Vec<Kicker>,
    /// Kickers whose trace entries are suppressed at boot.
    #[serde(default)]
    log_mask: Option<Vec<Kicker>>,
    /// Where the rail is pinned when the fixed override is engaged.
    #[serde(default)]
    pinned_opp: Option<Opp>,
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cfg = build_util::task_config_or_default::<ArbiterConfig>()?;

    let log_mask: KickerSet = match &cfg.log_mask {
        Some(kickers) => kickers.iter().copied().collect(),
        // GPU requests arrive at frame rate; keep them out of the trace
        // unless asked.
        None => KickerSet::EMPTY.with(Kicker::Gpu),
    };
    let pinned = cfg.pinned_opp.unwrap_or(Opp::HIGHEST);

    let mut out = String::new();
    writeln!(out, "pub(crate) const BUILD_CONFIG: Config = Config {{")?;
    writeln!(out, "    groups: [")?;
    for kicker in Kicker::ALL {
        let group = if cfg.ddr_kickers.contains(&kicker) {
            "Ddr"
        } else {
            "Vcore"
        };
        writeln!(out, "        KickerGroup::{group}, // {}", kicker.name())?;
    }
    writeln!(out, "    ],")?;
    writeln!(
        out,
        "    default_log_mask: KickerSet::from_bits_truncate({:#x}),",
        log_mask.bits()
    )?;
    writeln!(out, "    pinned_opp: Opp::{pinned:?},")?;
    writeln!(out, "}};")?;

    let dest = PathBuf::from(env::var_os("OUT_DIR").ok_or("OUT_DIR unset")?)
        .join("arbiter_config.rs");
    fs::write(dest, out)?;

    Ok(())
}
