// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod common;

use common::*;
use drv_vcore_api::{ArbError, Kicker, KickerSet, Opp, Rejection};
use drv_vcore_arbiter::{Config, DebugError};

fn show(a: &TestArbiter) -> String {
    let mut out = String::new();
    a.show(&mut out).unwrap();
    out
}

#[test]
fn show_lists_profile_and_table() {
    let a = arbiter();
    a.init(true, true, Some(Opp::Opp1));
    a.request(Kicker::Mm, Some(Opp::Opp2)).unwrap();

    let out = show(&a);
    for line in [
        "[feature_en   ]: 1",
        "[plat_init_opp]: 1",
        "[init_done    ]: 1",
        "[cal_lock     ]: -",
        "[kr_req_mask  ]: 0x0",
        "[kr_log_mask  ]: 0x10",
        "[fix_hpm_req  ]: 0",
        "[curr_opp     ]: 2",
        "[KIR_MM] opp: 2",
        "[KIR_BOOTUP] opp: 1",
        "[KIR_USB] opp: -1",
        "[transitions] done: 1",
    ] {
        assert!(out.lines().any(|l| l == line), "missing {line:?} in:\n{out}");
    }
    assert!(out.contains("[ram]vcore_dvfs_opp"));
}

#[test]
fn show_reports_calibration_owner() {
    let a = ready();
    a.request(Kicker::AutokSdio, Some(Opp::Opp3)).unwrap();
    assert!(show(&a).contains("[cal_lock     ]: KIR_AUTOK_SDIO\n"));
}

#[test]
fn kicker_name_forwards_to_request() {
    let a = ready();
    a.store("KIR_MM 2").unwrap();
    assert_eq!(a.entry(Kicker::Mm), Some(Opp::Opp2));
    assert_eq!(targets(&a), [Opp::Opp2]);

    assert_eq!(
        a.store("KIR_MM 2"),
        Err(DebugError::Request(ArbError::Rejected(Rejection::Unchanged)))
    );

    a.store("KIR_MM -1").unwrap();
    assert_eq!(a.entry(Kicker::Mm), None);
}

#[test]
fn bad_lines_are_refused() {
    let a = ready();
    assert_eq!(a.store("KIR_MM 7"), Err(DebugError::InvalidValue));
    assert_eq!(a.store("KIR_MM -2"), Err(DebugError::InvalidValue));
    assert_eq!(a.store("KIR_NOPE 1"), Err(DebugError::UnknownCommand));
    assert_eq!(a.store("KIR_MM"), Err(DebugError::Malformed));
    assert_eq!(a.store("KIR_MM two"), Err(DebugError::Malformed));
    assert_eq!(a.store("kr_log_mask -1"), Err(DebugError::InvalidValue));
    assert_eq!(applied(&a), 0);
}

#[test]
fn masks_are_written_directly() {
    let a = ready();
    a.store("kr_req_mask 0x18").unwrap();
    a.store("kr_log_mask 0").unwrap();

    let p = a.profile();
    assert_eq!(
        p.request_mask,
        KickerSet::EMPTY.with(Kicker::Usb).with(Kicker::Gpu)
    );
    assert_eq!(p.log_mask, KickerSet::EMPTY);
    assert!(show(&a).contains("[kr_req_mask  ]: 0x18\n"));

    // Bits past the last kicker are dropped.
    a.store("kr_req_mask 0xffffffff").unwrap();
    assert_eq!(a.profile().request_mask, KickerSet::ALL);
}

#[test]
fn disabling_parks_the_rail_high() {
    let a = ready();
    a.request(Kicker::Mm, Some(Opp::Opp1)).unwrap();

    a.store("feature_en 0").unwrap();
    assert!(!a.feature_enabled());
    assert_eq!(a.entry(Kicker::Sysfs), Some(Opp::HIGHEST));
    assert_eq!(targets(&a), [Opp::Opp1, Opp::HIGHEST]);
    assert_eq!(
        a.request(Kicker::Mm, Some(Opp::Opp2)),
        Err(ArbError::Rejected(Rejection::NotReady))
    );

    // Already off.
    a.store("feature_en 0").unwrap();
    assert_eq!(applied(&a), 2);

    a.store("feature_en 1").unwrap();
    assert!(a.feature_enabled());
    assert_eq!(a.entry(Kicker::Sysfs), None);
    assert_eq!(targets(&a), [Opp::Opp1, Opp::HIGHEST, Opp::Opp1]);
}

#[test]
fn enabling_needs_platform_support() {
    let a = with_parts(
        Config::DEFAULT,
        MockPlatform {
            supported: false,
            ..Default::default()
        },
    );
    a.init(false, true, None);

    a.store("feature_en 1").unwrap();
    assert!(!a.feature_enabled());
    assert_eq!(applied(&a), 0);
}

#[test]
fn force_identity_takes_over() {
    let a = ready();
    a.request(Kicker::Mm, Some(Opp::Opp1)).unwrap();

    a.store("KIR_SYSFSX 2").unwrap();
    assert_eq!(a.profile().request_mask, KickerSet::ALL);
    assert_eq!(a.entry(Kicker::SysfsX), Some(Opp::Opp2));
    assert_eq!(targets(&a), [Opp::Opp1, Opp::Opp2]);

    assert_eq!(
        a.store("KIR_MM 3"),
        Err(DebugError::Request(ArbError::Rejected(Rejection::Masked)))
    );

    // Forcing the same level again still drives the rail.
    a.store("KIR_SYSFSX 2").unwrap();
    assert_eq!(applied(&a), 3);

    a.store("KIR_SYSFSX -1").unwrap();
    assert_eq!(a.profile().request_mask, KickerSet::EMPTY);
    assert_eq!(a.entry(Kicker::SysfsX), None);
    assert_eq!(targets(&a).last(), Some(&Opp::LOWEST));

    assert_eq!(a.store("KIR_SYSFSX 4"), Err(DebugError::InvalidValue));
}

#[test]
fn fixed_override_locks_out_the_console() {
    let a = ready();
    a.force_permanent_override();
    let pinned = a.with_driver(|d| d.pinned);

    let disabled = Err(DebugError::Request(ArbError::Rejected(
        Rejection::PermanentlyDisabled,
    )));
    assert_eq!(a.store("feature_en 1"), disabled);
    assert_eq!(a.store("feature_en 0"), disabled);
    assert_eq!(a.store("KIR_SYSFSX -1"), disabled);
    assert_eq!(a.store("KIR_SYSFSX 1"), disabled);
    assert_eq!(a.store("KIR_MM 1"), disabled);

    assert!(!a.feature_enabled());
    assert_eq!(a.profile().request_mask, KickerSet::ALL);
    assert_eq!(a.entry(Kicker::SysfsX), None);
    assert_eq!(a.with_driver(|d| d.pinned), pinned);
    assert_eq!(applied(&a), 0);
}
