//! 重编址协议测试
//!
//! 时序断言：失能序列 → ESC_ID 写入 → 保存 → 拆除；以及写失败、
//! 保存失败两条分支各自的恢复语义。

use dm_link::mock::{LinkCall, MockLink};
use dm_link::{MotorIdentity, MotorModel, ParamId};
use dm_session::{EnableState, ReaddressError, Session, SessionError};

fn identity() -> MotorIdentity {
    MotorIdentity::new(0x01, 0x11, MotorModel::Dm4310)
}

fn connected() -> (Session<MockLink>, MockLink) {
    let link = MockLink::new();
    let probe = link.clone();
    let session = Session::connect(identity(), link).expect("connect");
    (session, probe)
}

/// 使能态下 1 → 2 重编址：顺序必须是
/// [command_velocity(0.0), disable, write_param(ESC_ID, 2), save_params]，
/// 且旧会话进入终态
#[test]
fn test_readdress_while_enabled_sequencing() {
    let (mut session, probe) = connected();
    session.enable().expect("enable");

    session.readdress(0x02).expect("readdress");

    let calls = probe.calls();
    assert_eq!(
        &calls[calls.len() - 4..],
        &[
            LinkCall::CommandVelocity(0x01, 0.0),
            LinkCall::Disable(0x01),
            LinkCall::WriteParam(0x01, ParamId::EscId, 2.0),
            LinkCall::SaveParams(0x01),
        ]
    );
    assert!(session.is_torn_down());
    // 新地址已进非易失区
    assert_eq!(probe.persisted_param(ParamId::EscId), Some(2.0));
    // 保存的协议副作用：电机失能
    assert!(!probe.motor_enabled());
}

/// 失能态下重编址：不需要先走失能序列
#[test]
fn test_readdress_while_disabled_skips_disable_sequence() {
    let (mut session, probe) = connected();
    let before = probe.calls().len();

    session.readdress(0x03).expect("readdress");

    let calls = probe.calls();
    assert_eq!(
        &calls[before..],
        &[
            LinkCall::WriteParam(0x01, ParamId::EscId, 3.0),
            LinkCall::SaveParams(0x01),
        ]
    );
    assert!(session.is_torn_down());
}

/// 写失败：绝不尝试保存，使能状态恢复到尝试前
#[test]
fn test_readdress_write_failure_restores_enable_state() {
    let (mut session, probe) = connected();
    session.enable().expect("enable");
    probe.set_reject_write(true);

    let err = session.readdress(0x02).unwrap_err();
    assert!(matches!(
        err,
        SessionError::Readdress(ReaddressError::WriteRejected)
    ));

    // 未发出任何保存调用
    assert!(!probe
        .calls()
        .iter()
        .any(|c| matches!(c, LinkCall::SaveParams(_))));
    // 使能状态已恢复，会话仍然可用
    assert_eq!(session.enable_state(), EnableState::Enabled);
    assert!(!session.is_torn_down());
    assert!(session.command_velocity(1.0).is_ok());
}

/// 失能态下的写失败：不做任何恢复动作，会话保持失能可用
#[test]
fn test_readdress_write_failure_while_disabled() {
    let (mut session, probe) = connected();
    probe.set_reject_write(true);

    let err = session.readdress(0x02).unwrap_err();
    assert!(matches!(
        err,
        SessionError::Readdress(ReaddressError::WriteRejected)
    ));
    assert_eq!(session.enable_state(), EnableState::Disabled);
    assert!(!session.is_torn_down());
    assert!(!probe
        .calls()
        .iter()
        .any(|c| matches!(c, LinkCall::Enable(_))));
}

/// 保存失败：写已生效，易失/非易失地址不一致——必须以独立的错误
/// 上报，且会话照样拆除
#[test]
fn test_readdress_save_failure_reported_distinctly() {
    let (mut session, probe) = connected();
    probe.set_reject_save(true);

    let err = session.readdress(0x02).unwrap_err();
    assert!(matches!(
        err,
        SessionError::Readdress(ReaddressError::SaveRejected)
    ));
    assert!(session.is_torn_down());

    // 易失区是新地址、非易失区还是旧地址
    assert_eq!(probe.volatile_param(ParamId::EscId), Some(2.0));
    assert_eq!(probe.persisted_param(ParamId::EscId), Some(1.0));
}

/// 写入阶段链路出错：与写被拒绝同路——不保存、尽力恢复使能状态，
/// 且错误本身带着"写阶段"标记
#[test]
fn test_readdress_link_error_during_write_restores_enable_state() {
    let (mut session, probe) = connected();
    session.enable().expect("enable");
    probe.set_fail_write(true);

    let err = session.readdress(0x02).unwrap_err();
    assert!(matches!(
        err,
        SessionError::Readdress(ReaddressError::WriteFailed(_))
    ));

    assert!(!probe
        .calls()
        .iter()
        .any(|c| matches!(c, LinkCall::SaveParams(_))));
    assert_eq!(session.enable_state(), EnableState::Enabled);
    assert!(!session.is_torn_down());
    // 易失地址没有改动
    assert_eq!(probe.volatile_param(ParamId::EscId), Some(1.0));
}

/// 保存阶段链路出错：易失地址已改、持久化结果未知——会话必须拆除，
/// 错误与写阶段的链路错误可区分
#[test]
fn test_readdress_link_error_during_save_tears_down() {
    let (mut session, probe) = connected();
    probe.set_fail_save(true);

    let err = session.readdress(0x02).unwrap_err();
    assert!(matches!(
        err,
        SessionError::Readdress(ReaddressError::SaveFailed(_))
    ));
    assert!(session.is_torn_down());

    // 写已生效，非易失区还是旧地址
    assert_eq!(probe.volatile_param(ParamId::EscId), Some(2.0));
    assert_eq!(probe.persisted_param(ParamId::EscId), Some(1.0));
}

/// 非法新地址直接拒绝，不碰链路
#[test]
fn test_readdress_invalid_id_rejected() {
    let (mut session, probe) = connected();
    let before = probe.calls().len();

    for bad in [0u8, 0x80, 0xFF] {
        let err = session.readdress(bad).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Readdress(ReaddressError::InvalidId(_))
        ));
    }
    assert_eq!(probe.calls().len(), before);
    assert!(!session.is_torn_down());
}

/// 拆除后的会话拒绝重编址
#[test]
fn test_readdress_after_teardown_rejected() {
    let (mut session, _probe) = connected();
    session.disconnect();
    assert!(matches!(
        session.readdress(0x02).unwrap_err(),
        SessionError::TornDown
    ));
}

/// 重编址成功后以新地址重建会话（操作者流程的下半段）
#[test]
fn test_reconnect_under_new_identity() {
    let (mut session, probe) = connected();
    session.readdress(0x02).expect("readdress");
    assert!(session.is_torn_down());

    let new_identity = MotorIdentity::new(0x02, 0x11, MotorModel::Dm4310);
    let mut session2 = Session::connect(new_identity, probe.clone()).expect("reconnect");
    session2.enable().expect("enable");
    assert!(session2.command_velocity(1.0).is_ok());
}
