//! End-to-end lifecycle walkthroughs over the pure engine: first-use
//! binding, lazy countdown, pause/resume, app cascades and expiry.

use chrono::{DateTime, Duration, TimeZone, Utc};
use keygate_core::{App, AppStatus, LicenseKey};
use keygate_engine::{accountant, duration::parse_duration_ms, protocol};
use keygate_engine::protocol::ResultCode;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

fn app_on() -> App {
    App {
        id: "app_1".into(),
        name: "demo".into(),
        owner_user_id: "owner".into(),
        status: AppStatus::On,
        created_at: t0(),
    }
}

fn fresh_key(duration: &str) -> LicenseKey {
    let ms = parse_duration_ms(duration).expect("test duration must parse");
    LicenseKey {
        id: "key_1".into(),
        app_id: "app_1".into(),
        name: "demo key".into(),
        token: "KG-AAAA-BBBB-CCCC-DDDD".into(),
        duration_input: duration.into(),
        duration_ms: ms,
        remaining_ms: ms,
        started_at: None,
        last_tick_at: None,
        paused: false,
        paused_by_app: false,
        hwid: None,
        first_used_at: None,
        created_by_user_id: "owner".into(),
        created_at: t0(),
        version: 0,
    }
}

#[test]
fn one_hour_grant_burns_in_real_time() {
    let app = app_on();
    let mut key = fresh_key("1h");
    assert_eq!(key.duration_ms, 3_600_000);

    // First validate binds the device and starts the countdown.
    let out = protocol::validate(&app, &mut key, "PC-1", t0());
    assert_eq!(out.code, ResultCode::Ok);
    assert_eq!(out.remaining_secs, 3_600);
    assert!(out.changed);
    assert_eq!(key.hwid.as_deref(), Some("PC-1"));
    assert_eq!(key.started_at, Some(t0()));
    assert_eq!(key.first_used_at, Some(t0()));

    // 1000 seconds later the same device sees the balance drained.
    let later = t0() + Duration::seconds(1000);
    let out = protocol::validate(&app, &mut key, "PC-1", later);
    assert_eq!(out.code, ResultCode::Ok);
    assert_eq!(out.remaining_secs, 2_600);
    assert_eq!(key.remaining_ms, 2_600_000);
    assert_eq!(key.last_tick_at, Some(later));
}

#[test]
fn manual_pause_freezes_and_resume_reanchors() {
    let app = app_on();
    let mut key = fresh_key("1h");
    protocol::validate(&app, &mut key, "PC-1", t0());

    // Pause half an hour in: the balance freezes at that instant.
    let pause_at = t0() + Duration::seconds(1800);
    let out = protocol::set_paused(&app, &mut key, true, pause_at);
    assert_eq!(out.code, ResultCode::Ok);
    assert_eq!(key.remaining_ms, 1_800_000);
    assert_eq!(key.last_tick_at, None);

    // Validation attempts while paused fail without touching the balance.
    let during = t0() + Duration::seconds(3000);
    let out = protocol::validate(&app, &mut key, "PC-1", during);
    assert_eq!(out.code, ResultCode::KeyPaused);
    assert!(!out.changed);
    assert_eq!(key.remaining_ms, 1_800_000);

    // Resume much later: nothing was charged for the pause window.
    let resume_at = t0() + Duration::seconds(5000);
    protocol::set_paused(&app, &mut key, false, resume_at);
    assert_eq!(key.remaining_ms, 1_800_000);
    assert_eq!(key.last_tick_at, Some(resume_at));
}

#[test]
fn app_off_window_charges_no_time() {
    let app = app_on();
    let mut keys: Vec<LicenseKey> = (0..3)
        .map(|i| {
            let mut k = fresh_key("1h");
            k.id = format!("key_{i}");
            k.token = format!("KG-KEY-{i}");
            protocol::validate(&app, &mut k, "PC-1", t0());
            k
        })
        .collect();

    let off_at = t0() + Duration::seconds(60);
    accountant::cascade_app_off(&mut keys, off_at);
    for k in &keys {
        assert!(k.paused && k.paused_by_app);
        assert_eq!(k.remaining_ms, 3_540_000);
        assert_eq!(k.last_tick_at, None);
    }

    let on_at = off_at + Duration::minutes(10);
    accountant::cascade_app_on(&mut keys, on_at);
    for k in &keys {
        assert!(!k.paused && !k.paused_by_app);
        assert_eq!(k.remaining_ms, 3_540_000, "no time may elapse while the app is off");
        assert_eq!(k.last_tick_at, Some(on_at));
    }
}

#[test]
fn paused_app_rejects_validation_before_key_checks() {
    let mut app = app_on();
    app.status = AppStatus::Off;
    let mut key = fresh_key("1h");
    key.paused = true;

    let out = protocol::validate(&app, &mut key, "PC-1", t0());
    assert_eq!(out.code, ResultCode::AppPaused);
}

#[test]
fn short_grant_expires_and_freezes_at_zero() {
    let app = app_on();
    let mut key = fresh_key("10s");
    protocol::validate(&app, &mut key, "PC-1", t0());

    let out = protocol::validate(&app, &mut key, "PC-1", t0() + Duration::seconds(11));
    assert_eq!(out.code, ResultCode::KeyExpired);
    assert_eq!(key.remaining_ms, 0);
    assert_eq!(key.last_tick_at, None);

    // Expired is terminal: even the bound device keeps seeing expiry.
    let out = protocol::validate(&app, &mut key, "PC-1", t0() + Duration::seconds(20));
    assert_eq!(out.code, ResultCode::KeyExpired);
}

#[test]
fn expired_key_reports_expiry_not_mismatch() {
    let app = app_on();
    let mut key = fresh_key("10s");
    protocol::validate(&app, &mut key, "PC-1", t0());

    let out = protocol::validate(&app, &mut key, "PC-OTHER", t0() + Duration::seconds(11));
    assert_eq!(out.code, ResultCode::KeyExpired);
}

#[test]
fn binding_is_exclusive_until_reset() {
    let app = app_on();
    let mut key = fresh_key("1h");
    protocol::validate(&app, &mut key, "PC-1", t0());

    let out = protocol::validate(&app, &mut key, "PC-2", t0() + Duration::seconds(5));
    assert_eq!(out.code, ResultCode::HwidMismatch);
    assert_eq!(key.hwid.as_deref(), Some("PC-1"));

    // An hwid reset clears the binding but not the clock.
    accountant::reset_hwid(&mut key);
    let rebind_at = t0() + Duration::seconds(10);
    let out = protocol::validate(&app, &mut key, "PC-2", rebind_at);
    assert_eq!(out.code, ResultCode::Ok);
    assert_eq!(key.hwid.as_deref(), Some("PC-2"));
    assert_eq!(key.started_at, Some(t0()), "rebinding must not restart the countdown");
}

#[test]
fn missing_hwid_is_rejected() {
    let app = app_on();
    let mut key = fresh_key("1h");
    let out = protocol::validate(&app, &mut key, "   ", t0());
    assert_eq!(out.code, ResultCode::HwidRequired);
    assert!(key.hwid.is_none());
    assert!(key.started_at.is_none());
}

#[test]
fn extension_during_flight_preserves_elapsed_time() {
    let app = app_on();
    let mut key = fresh_key("1h");
    protocol::validate(&app, &mut key, "PC-1", t0());

    // Ten minutes in, add another hour: elapsed time is banked first.
    let extend_at = t0() + Duration::minutes(10);
    let out = protocol::extend(&app, &mut key, 3_600_000, extend_at);
    assert_eq!(out.code, ResultCode::Ok);
    assert_eq!(key.remaining_ms, 3_000_000 + 3_600_000);
    assert_eq!(key.last_tick_at, Some(extend_at));
}

#[test]
fn status_tick_advances_the_anchor() {
    let app = app_on();
    let mut key = fresh_key("1h");
    protocol::validate(&app, &mut key, "PC-1", t0());

    let later = t0() + Duration::seconds(90);
    let out = protocol::status(&app, &mut key, later);
    assert_eq!(out.remaining_secs, 3_510);
    assert!(out.changed);
    assert_eq!(key.last_tick_at, Some(later));
}

#[test]
fn key_state_reflects_lifecycle() {
    use keygate_engine::protocol::{KeyState, key_state};

    let app = app_on();
    let mut key = fresh_key("10s");
    assert_eq!(key_state(&key, t0(), false), KeyState::NotStarted);

    protocol::validate(&app, &mut key, "PC-1", t0());
    assert_eq!(key_state(&key, t0() + Duration::seconds(1), false), KeyState::Active);

    assert_eq!(key_state(&key, t0(), true), KeyState::PausedByApp);

    protocol::set_paused(&app, &mut key, true, t0() + Duration::seconds(2));
    assert_eq!(key_state(&key, t0() + Duration::seconds(3), false), KeyState::PausedManual);

    protocol::set_paused(&app, &mut key, false, t0() + Duration::seconds(3));
    assert_eq!(key_state(&key, t0() + Duration::seconds(30), false), KeyState::Expired);
}
