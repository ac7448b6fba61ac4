// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Debug control surface.
//!
//! A line-oriented interface meant to be wired to whatever the board offers a
//! human (a console command, a debugger-visible buffer). `show` dumps the
//! arbiter's state; `store` takes a single `<command> <value>` line, where
//! the value is decimal (possibly negative) or `0x`-prefixed hex.
//!
//! | command | effect |
//! |---|---|
//! | `feature_en <v>` | enable or disable arbitration, moving the rail |
//! | `kr_req_mask <bits>` | replace the request mask |
//! | `kr_log_mask <bits>` | replace the log mask |
//! | `KIR_SYSFSX <opp>` | force the rail, masking everyone else |
//! | `<KICKER> <opp>` | an ordinary request on behalf of that kicker |
//!
//! OPP values are `-1` (release) through `3`.
//!
//! Once the fixed override is in place, `feature_en` and `KIR_SYSFSX` are
//! refused along with every kicker request. The mask commands still write.

use core::fmt;

use crate::trace::Trace;
use crate::{Arbiter, Calibration, Platform, Recorder, TransitionDriver};
use drv_vcore_api::{
    ArbError, Kicker, KickerSet, Opp, Rejection, TransitionRequest,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DebugError {
    /// Not a `<command> <value>` line.
    Malformed,
    UnknownCommand,
    /// The value is out of range for the command.
    InvalidValue,
    /// The command reached the arbiter and it said no.
    Request(ArbError),
}

impl From<ArbError> for DebugError {
    fn from(e: ArbError) -> Self {
        DebugError::Request(e)
    }
}

fn parse_value(raw: &str) -> Option<i64> {
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok().map(i64::from),
        None => raw.parse::<i32>().ok().map(i64::from),
    }
}

fn parse_line(line: &str) -> Result<(&str, i64), DebugError> {
    let mut words = line.split_whitespace();
    let (Some(cmd), Some(raw), None) =
        (words.next(), words.next(), words.next())
    else {
        return Err(DebugError::Malformed);
    };
    let value = parse_value(raw).ok_or(DebugError::Malformed)?;
    Ok((cmd, value))
}

fn mask_value(value: i64) -> Result<KickerSet, DebugError> {
    u32::try_from(value)
        .map(KickerSet::from_bits_truncate)
        .map_err(|_| DebugError::InvalidValue)
}

fn opp_value(value: i64) -> Result<Option<Opp>, DebugError> {
    i32::try_from(value)
        .ok()
        .and_then(|v| Opp::from_request_code(v).ok())
        .ok_or(DebugError::InvalidValue)
}

fn flag(b: bool) -> u8 {
    u8::from(b)
}

impl<D, P, R, C> Arbiter<D, P, R, C>
where
    D: TransitionDriver,
    P: Platform,
    R: Recorder,
    C: Calibration,
{
    /// Writes a human-readable dump of the arbiter's state.
    pub fn show(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        let guard = self.state.lock();
        let engine = &guard.engine;
        let profile = &engine.profile;

        writeln!(out, "[feature_en   ]: {}", flag(engine.feature_enabled))?;
        writeln!(
            out,
            "[plat_init_opp]: {}",
            Opp::request_code(profile.platform_opp)
        )?;
        writeln!(out, "[init_done    ]: {}", flag(profile.init_done))?;
        writeln!(
            out,
            "[cal_lock     ]: {}",
            profile.calibration_owner.map_or("-", Kicker::name)
        )?;
        writeln!(out, "[kr_req_mask  ]: {:#x}", profile.request_mask.bits())?;
        writeln!(out, "[kr_log_mask  ]: {:#x}", profile.log_mask.bits())?;
        writeln!(out, "[fix_hpm_req  ]: {}", flag(profile.fixed_override))?;
        writeln!(out)?;

        writeln!(
            out,
            "[curr_opp     ]: {}",
            Opp::request_code(guard.driver.current_opp())
        )?;
        writeln!(out)?;

        for (kicker, opp) in engine.registry.iter() {
            writeln!(
                out,
                "[{}] opp: {}",
                kicker.name(),
                Opp::request_code(opp)
            )?;
        }
        writeln!(out)?;

        for (reason, n) in engine.counters.rejections.iter() {
            writeln!(out, "[{reason:?}] rejected: {n}")?;
        }
        for (fault, n) in engine.counters.faults.iter() {
            writeln!(out, "[{fault:?}] failed: {n}")?;
        }
        writeln!(out, "[transitions] done: {}", engine.counters.transitions)?;
        writeln!(out)?;

        guard.recorder.dump(out)
    }

    /// Parses and executes one command line.
    pub fn store(&self, line: &str) -> Result<(), DebugError> {
        let (cmd, value) = parse_line(line)?;

        match cmd {
            "feature_en" => self.debug_feature_enable(value != 0),
            "kr_req_mask" => {
                let mask = mask_value(value)?;
                let mut guard = self.state.lock();
                guard.engine.profile.request_mask = mask;
                guard.engine.trace(Trace::RequestMask(mask));
                Ok(())
            }
            "kr_log_mask" => {
                let mask = mask_value(value)?;
                let mut guard = self.state.lock();
                guard.engine.profile.log_mask = mask;
                guard.engine.trace(Trace::LogMask(mask));
                Ok(())
            }
            _ => {
                let kicker =
                    Kicker::from_name(cmd).ok_or(DebugError::UnknownCommand)?;
                let opp = opp_value(value)?;
                if kicker == Kicker::FORCE {
                    self.debug_force(opp)
                } else {
                    self.request(kicker, opp)?;
                    Ok(())
                }
            }
        }
    }

    /// Turning the feature off parks the debug kicker at the top so the rail
    /// is left somewhere safe; turning it back on withdraws that and lets the
    /// group resolve. Asking for the state it is already in does nothing.
    fn debug_feature_enable(&self, enable: bool) -> Result<(), DebugError> {
        let mut guard = self.state.lock();
        let supported = guard.platform.feature_supported();
        let crate::State { engine, driver, .. } = &mut *guard;

        let kicker = Kicker::Sysfs;
        if engine.profile.fixed_override {
            let r = engine.reject(kicker, Rejection::PermanentlyDisabled);
            return Err(ArbError::from(r).into());
        }

        let req = if enable && supported && !engine.feature_enabled {
            engine.registry.set(kicker, None);
            TransitionRequest {
                kicker,
                requested: None,
                target: engine.resolve(engine.config.group_of(kicker)),
            }
        } else if !enable && engine.feature_enabled {
            engine.registry.set(kicker, Some(Opp::HIGHEST));
            TransitionRequest {
                kicker,
                requested: Some(Opp::HIGHEST),
                target: Opp::HIGHEST,
            }
        } else {
            return Ok(());
        };

        let r = engine.apply(driver, &req);
        engine.feature_enabled = enable;
        engine.trace(Trace::FeatureEnable(enable));
        r?;
        Ok(())
    }

    /// Drives the rail straight to `opp`, bypassing arbitration. A level
    /// masks every kicker so nothing moves it again; a release unmasks them
    /// and drops the rail to the bottom.
    fn debug_force(&self, opp: Option<Opp>) -> Result<(), DebugError> {
        let mut guard = self.state.lock();
        let crate::State { engine, driver, .. } = &mut *guard;

        if engine.profile.fixed_override {
            let r =
                engine.reject(Kicker::FORCE, Rejection::PermanentlyDisabled);
            return Err(ArbError::from(r).into());
        }

        let mask = if opp.is_some() {
            KickerSet::ALL
        } else {
            KickerSet::EMPTY
        };
        engine.profile.request_mask = mask;
        engine.trace(Trace::RequestMask(mask));
        engine.registry.set(Kicker::FORCE, opp);

        let req = TransitionRequest {
            kicker: Kicker::FORCE,
            requested: opp,
            target: opp.unwrap_or(Opp::LOWEST),
        };
        engine.apply(driver, &req)?;
        Ok(())
    }
}
