//! 无硬件联调用的模拟链路
//!
//! 模拟单台 DM 电机：反馈速度跟随最近一次速度指令，寄存器表区分
//! 易失区与非易失区，可脚本化注入各类失败。所有状态放在共享内部，
//! `MockLink` 句柄可克隆——会话拿走一份独占驱动，测试留一份探查
//! 调用顺序与最终寄存器状态。

use crate::{ControlMode, FeedbackSample, LinkError, MotorIdentity, MotorLink, ParamId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// 一次链路调用的记录，供测试断言时序
#[derive(Debug, Clone, PartialEq)]
pub enum LinkCall {
    Register(u8),
    SwitchMode(u8, ControlMode),
    Enable(u8),
    Disable(u8),
    CommandVelocity(u8, f64),
    ReadParam(u8, ParamId),
    WriteParam(u8, ParamId, f64),
    SaveParams(u8),
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<LinkCall>,
    registered: Vec<u8>,
    volatile: HashMap<ParamId, f64>,
    persisted: HashMap<ParamId, f64>,
    enabled: bool,
    last_velocity: f64,
    reject_mode_switch: bool,
    reject_write: bool,
    reject_save: bool,
    fail_write: bool,
    fail_save: bool,
    /// 第 N 次（0 起）速度指令开始返回 IO 错误
    fail_commands_from: Option<usize>,
    commands_seen: usize,
}

/// 模拟链路句柄
#[derive(Debug, Clone, Default)]
pub struct MockLink {
    state: Arc<Mutex<MockState>>,
}

impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- 失败注入 ----

    /// 让后续模式切换一律被拒绝
    pub fn set_reject_mode_switch(&self, reject: bool) {
        self.state.lock().reject_mode_switch = reject;
    }

    /// 让后续寄存器写入一律被拒绝
    pub fn set_reject_write(&self, reject: bool) {
        self.state.lock().reject_write = reject;
    }

    /// 让后续参数保存一律被拒绝
    pub fn set_reject_save(&self, reject: bool) {
        self.state.lock().reject_save = reject;
    }

    /// 让后续寄存器写入返回链路超时（拒绝是电机应答 `false`，
    /// 这里是链路层面根本没等到响应）
    pub fn set_fail_write(&self, fail: bool) {
        self.state.lock().fail_write = fail;
    }

    /// 让后续参数保存返回链路超时
    pub fn set_fail_save(&self, fail: bool) {
        self.state.lock().fail_save = fail;
    }

    /// 从第 `n` 次（0 起）速度指令开始返回 IO 错误
    pub fn fail_commands_from(&self, n: usize) {
        self.state.lock().fail_commands_from = Some(n);
    }

    // ---- 测试探查 ----

    /// 当前为止的调用序列快照
    pub fn calls(&self) -> Vec<LinkCall> {
        self.state.lock().calls.clone()
    }

    /// 非易失区的寄存器值（只有 `save_params` 成功后才会更新）
    pub fn persisted_param(&self, param: ParamId) -> Option<f64> {
        self.state.lock().persisted.get(&param).copied()
    }

    /// 易失区的寄存器值
    pub fn volatile_param(&self, param: ParamId) -> Option<f64> {
        self.state.lock().volatile.get(&param).copied()
    }

    /// 模拟电机当前是否处于使能状态
    pub fn motor_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    fn check_registered(state: &MockState, identity: &MotorIdentity) -> Result<(), LinkError> {
        if state.registered.contains(&identity.can_id) {
            Ok(())
        } else {
            Err(LinkError::NotRegistered(identity.can_id))
        }
    }
}

impl MotorLink for MockLink {
    fn register(&mut self, identity: &MotorIdentity) -> Result<(), LinkError> {
        let mut state = self.state.lock();
        state.calls.push(LinkCall::Register(identity.can_id));
        state.registered.push(identity.can_id);
        // 按型号预置寄存器表
        let seed = [
            (ParamId::EscId, identity.can_id as f64),
            (ParamId::MasterId, identity.master_id as f64),
            (ParamId::VMax, identity.model.velocity_limit()),
            (ParamId::TMax, 10.0),
            (ParamId::GearRatio, 10.0),
            (ParamId::PMax, 12.5),
            (ParamId::SubVer, 1.0),
        ];
        state.volatile.extend(seed);
        state.persisted.extend(seed);
        Ok(())
    }

    fn switch_mode(
        &mut self,
        identity: &MotorIdentity,
        mode: ControlMode,
    ) -> Result<bool, LinkError> {
        let mut state = self.state.lock();
        state
            .calls
            .push(LinkCall::SwitchMode(identity.can_id, mode));
        Self::check_registered(&state, identity)?;
        if state.reject_mode_switch {
            return Ok(false);
        }
        state.volatile.insert(ParamId::CtrlMode, u8::from(mode) as f64);
        Ok(true)
    }

    fn enable(&mut self, identity: &MotorIdentity) -> Result<(), LinkError> {
        let mut state = self.state.lock();
        state.calls.push(LinkCall::Enable(identity.can_id));
        Self::check_registered(&state, identity)?;
        state.enabled = true;
        Ok(())
    }

    fn disable(&mut self, identity: &MotorIdentity) -> Result<(), LinkError> {
        let mut state = self.state.lock();
        state.calls.push(LinkCall::Disable(identity.can_id));
        Self::check_registered(&state, identity)?;
        state.enabled = false;
        Ok(())
    }

    fn command_velocity(
        &mut self,
        identity: &MotorIdentity,
        rad_s: f64,
    ) -> Result<FeedbackSample, LinkError> {
        let mut state = self.state.lock();
        state
            .calls
            .push(LinkCall::CommandVelocity(identity.can_id, rad_s));
        Self::check_registered(&state, identity)?;
        if let Some(from) = state.fail_commands_from
            && state.commands_seen >= from
        {
            return Err(LinkError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "simulated transport failure",
            )));
        }
        state.commands_seen += 1;
        // 理想电机：反馈速度立即跟上指令
        state.last_velocity = if state.enabled { rad_s } else { 0.0 };
        Ok(FeedbackSample {
            velocity: state.last_velocity,
            torque: 0.02 * state.last_velocity,
            sampled_at: Instant::now(),
        })
    }

    fn read_param(
        &mut self,
        identity: &MotorIdentity,
        param: ParamId,
    ) -> Result<Option<f64>, LinkError> {
        let mut state = self.state.lock();
        state.calls.push(LinkCall::ReadParam(identity.can_id, param));
        Self::check_registered(&state, identity)?;
        Ok(state.volatile.get(&param).copied())
    }

    fn write_param(
        &mut self,
        identity: &MotorIdentity,
        param: ParamId,
        value: f64,
    ) -> Result<bool, LinkError> {
        let mut state = self.state.lock();
        state
            .calls
            .push(LinkCall::WriteParam(identity.can_id, param, value));
        Self::check_registered(&state, identity)?;
        if state.fail_write {
            return Err(LinkError::Timeout);
        }
        if state.reject_write {
            return Ok(false);
        }
        state.volatile.insert(param, value);
        Ok(true)
    }

    fn save_params(&mut self, identity: &MotorIdentity) -> Result<bool, LinkError> {
        let mut state = self.state.lock();
        state.calls.push(LinkCall::SaveParams(identity.can_id));
        Self::check_registered(&state, identity)?;
        if state.fail_save {
            return Err(LinkError::Timeout);
        }
        if state.reject_save {
            return Ok(false);
        }
        // 协议副作用：保存过程使电机失能
        state.enabled = false;
        state.persisted = state.volatile.clone();
        Ok(true)
    }
}
