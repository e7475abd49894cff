//! 会话管理器
//!
//! 独占持有一台电机的链路句柄，负责 连接 → 配置模式 → 使能/失能 →
//! （可选）重编址 → 断开 的完整生命周期，并强制执行让裸链路可以被
//! 不可信调用方安全驱动的顺序约束：
//!
//! - 失能前必须先下发零速指令（电机不得带着非零目标被失能）；
//! - `enable`/`disable` 无协议级 ACK，以固定稳定间隔兜底；
//! - 任何退出路径（显式断开、错误、Drop）都尽力走安全停机序列。
//!
//! 状态机：`Unconnected → Connected/Disabled → Enabled ⇄ Disabled →
//! TornDown`。TornDown 是终态，重新 `connect` 产生新的会话值。

use crossbeam_channel::{Receiver, Sender};
use dm_link::{ControlMode, FeedbackSample, MotorIdentity, MotorLink, ParamId};
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{ReaddressError, SessionError};
use crate::event::SessionEvent;

/// 使能指令后的稳定间隔
///
/// 使能在协议层没有成功标志，只能等待实测响应延迟的上界。这是外部
/// 链路的协议局限，不在本层伪装精确。
pub const ENABLE_SETTLE: Duration = Duration::from_millis(200);

/// 零速指令与失能指令之间的稳定间隔
pub const STOP_SETTLE: Duration = Duration::from_millis(50);

/// 力矩输出状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnableState {
    Disabled,
    Enabled,
}

/// 一台电机的控制会话
///
/// 链路句柄被会话独占（`None` 即已拆除）。指令循环以 `&mut Session`
/// 借用驱动，天然与维护操作互斥。
#[derive(Debug)]
pub struct Session<L: MotorLink> {
    identity: MotorIdentity,
    link: Option<L>,
    control_mode: ControlMode,
    enable_state: EnableState,
    last_feedback: Option<FeedbackSample>,
    event_tx: Sender<SessionEvent>,
    event_rx: Receiver<SessionEvent>,
}

impl<L: MotorLink> Session<L> {
    /// 建立会话并切换到速度模式
    ///
    /// 打开字节流、构造链路是调用方（链路工厂）的事；这里注册身份并
    /// 下发模式切换。链路自带重试，本调用可能阻塞数百毫秒——交互线
    /// 程不要直接调。
    pub fn connect(identity: MotorIdentity, link: L) -> Result<Self, SessionError> {
        Self::connect_in_mode(identity, link, ControlMode::Velocity)
    }

    /// 建立会话并切换到指定控制模式
    ///
    /// 速度指令循环只接受速度模式的会话；其余模式的会话可以读参数，
    /// 但 [`enable`](Self::enable) 会拒绝。
    pub fn connect_in_mode(
        identity: MotorIdentity,
        mut link: L,
        mode: ControlMode,
    ) -> Result<Self, SessionError> {
        if !MotorIdentity::can_id_valid(identity.can_id) {
            return Err(SessionError::InvalidCanId(identity.can_id));
        }

        link.register(&identity)?;

        info!(can_id = identity.can_id, ?mode, "switching control mode");
        if !link.switch_mode(&identity, mode)? {
            return Err(SessionError::ModeSwitchRejected(mode));
        }

        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let session = Session {
            identity,
            link: Some(link),
            control_mode: mode,
            enable_state: EnableState::Disabled,
            last_feedback: None,
            event_tx,
            event_rx,
        };
        session.emit(SessionEvent::Connected);
        info!(can_id = identity.can_id, "session connected (disabled)");
        Ok(session)
    }

    // ---- 只读访问 ----

    pub fn identity(&self) -> MotorIdentity {
        self.identity
    }

    pub fn control_mode(&self) -> ControlMode {
        self.control_mode
    }

    pub fn enable_state(&self) -> EnableState {
        self.enable_state
    }

    pub fn is_enabled(&self) -> bool {
        self.enable_state == EnableState::Enabled
    }

    /// 会话是否已拆除（终态）
    pub fn is_torn_down(&self) -> bool {
        self.link.is_none()
    }

    /// 最近一次反馈采样
    pub fn latest_feedback(&self) -> Option<FeedbackSample> {
        self.last_feedback
    }

    /// 状态事件接收端（单消费者）
    pub fn events(&self) -> Receiver<SessionEvent> {
        self.event_rx.clone()
    }

    // ---- 生命周期操作 ----

    /// 打开力矩输出
    ///
    /// 只有速度模式的会话可以使能。发送使能指令后等待
    /// [`ENABLE_SETTLE`] 再认定完成。
    pub fn enable(&mut self) -> Result<(), SessionError> {
        if self.control_mode != ControlMode::Velocity {
            return Err(SessionError::NotVelocityMode(self.control_mode));
        }
        if self.enable_state == EnableState::Enabled {
            return Ok(());
        }

        let identity = self.identity;
        self.link_mut()?.enable(&identity)?;
        // 无 ACK，等待电机实际进入使能态
        std::thread::sleep(ENABLE_SETTLE);

        self.enable_state = EnableState::Enabled;
        self.emit(SessionEvent::Enabled);
        info!(can_id = identity.can_id, "motor enabled");
        Ok(())
    }

    /// 关闭力矩输出
    ///
    /// 硬性顺序约束：先下发零速指令，等 [`STOP_SETTLE`]，再失能——
    /// 电机不得带着非零的最后目标被失能。已失能时是 no-op。
    ///
    /// 每一步都会被尝试；返回第一处错误，但不会因此跳过后续步骤。
    pub fn disable(&mut self) -> Result<(), SessionError> {
        if self.enable_state == EnableState::Disabled {
            return Ok(());
        }

        let identity = self.identity;
        let link = self.link_mut()?;
        let mut first_err = None;

        if let Err(e) = link.command_velocity(&identity, 0.0) {
            warn!(error = %e, "zero-velocity command failed during disable");
            first_err = Some(e);
        }
        std::thread::sleep(STOP_SETTLE);
        if let Err(e) = link.disable(&identity) {
            warn!(error = %e, "disable command failed");
            first_err.get_or_insert(e);
        }

        self.enable_state = EnableState::Disabled;
        self.emit(SessionEvent::Disabled);
        info!(can_id = identity.can_id, "motor disabled");
        match first_err {
            None => Ok(()),
            Some(e) => Err(e.into()),
        }
    }

    /// 下发速度目标，返回随响应捎带的反馈采样
    ///
    /// 目标值原样转发；速度包络的钳位是指令循环的职责。
    pub fn command_velocity(&mut self, rad_s: f64) -> Result<FeedbackSample, SessionError> {
        if self.is_torn_down() {
            return Err(SessionError::TornDown);
        }
        if self.enable_state != EnableState::Enabled {
            return Err(SessionError::NotEnabled);
        }

        let identity = self.identity;
        let sample = self.link_mut()?.command_velocity(&identity, rad_s)?;
        self.last_feedback = Some(sample);
        Ok(sample)
    }

    /// 读电机寄存器（失能状态下也允许）
    pub fn read_param(&mut self, param: ParamId) -> Result<Option<f64>, SessionError> {
        let identity = self.identity;
        Ok(self.link_mut()?.read_param(&identity, param)?)
    }

    /// 断开会话
    ///
    /// 若仍在使能态则先尽力走失能序列（失败只记录，绝不因此跳过关闭
    /// 传输）；随后释放链路句柄、进入终态。幂等：重复调用是 no-op。
    pub fn disconnect(&mut self) {
        if self.is_torn_down() {
            return;
        }

        if self.enable_state == EnableState::Enabled
            && let Err(e) = self.disable()
        {
            warn!(error = %e, "disable during disconnect failed; releasing link anyway");
        }

        self.link = None;
        self.emit(SessionEvent::TornDown);
        info!(can_id = self.identity.can_id, "session torn down");
    }

    /// 重编址：改写电机的总线地址并持久化
    ///
    /// 维护操作，时序最严格：
    /// 1. 若在使能态，先走完整失能序列；
    /// 2. 以旧地址写 `ESC_ID` 易失寄存器；
    /// 3. 写成功才保存到非易失存储（保存在协议层会顺带失能电机，
    ///    与第 1 步幂等）；
    /// 4. 旧地址会话就此失效，直接拆除（不再重复失能）；调用方需用
    ///    新地址重新 `connect`；
    /// 5. 写失败则中止：不保存，尽力恢复先前的使能状态。
    ///
    /// 绝不可与指令循环交错——两者都要求 `&mut Session`，借用检查
    /// 已经排除了并发。
    pub fn readdress(&mut self, new_can_id: u8) -> Result<(), SessionError> {
        if self.is_torn_down() {
            return Err(SessionError::TornDown);
        }
        if !MotorIdentity::can_id_valid(new_can_id) {
            return Err(ReaddressError::InvalidId(new_can_id).into());
        }

        let was_enabled = self.enable_state == EnableState::Enabled;
        if was_enabled {
            self.disable()?;
        }

        let identity = self.identity;
        info!(
            old = identity.can_id,
            new = new_can_id,
            "re-addressing motor"
        );

        match self
            .link_mut()?
            .write_param(&identity, ParamId::EscId, new_can_id as f64)
        {
            Ok(true) => {}
            Ok(false) => {
                warn!("ESC_ID write rejected; aborting before save");
                self.restore_enable(was_enabled);
                return Err(ReaddressError::WriteRejected.into());
            }
            Err(e) => {
                warn!(error = %e, "link error during ESC_ID write; aborting before save");
                self.restore_enable(was_enabled);
                return Err(ReaddressError::WriteFailed(e).into());
            }
        }

        let saved = self.link_mut()?.save_params(&identity);
        // 保存流程已在协议层失能电机
        self.enable_state = EnableState::Disabled;
        // 旧身份下的会话自此失效，无论保存结果如何都必须拆除
        self.link = None;
        self.emit(SessionEvent::TornDown);

        match saved {
            Ok(true) => {
                info!(new = new_can_id, "new CAN id persisted; reconnect required");
                Ok(())
            }
            Ok(false) => Err(ReaddressError::SaveRejected.into()),
            Err(e) => Err(ReaddressError::SaveFailed(e).into()),
        }
    }

    // ---- 内部 ----

    fn link_mut(&mut self) -> Result<&mut L, SessionError> {
        self.link.as_mut().ok_or(SessionError::TornDown)
    }

    fn emit(&self, event: SessionEvent) {
        // 没有订阅者不是错误
        let _ = self.event_tx.send(event);
    }

    /// 重编址中止后尽力恢复先前的使能状态
    fn restore_enable(&mut self, was_enabled: bool) {
        if !was_enabled {
            return;
        }
        match self.enable() {
            Ok(()) => info!("previous enable state restored"),
            Err(e) => warn!(error = %e, "failed to restore enable state after aborted re-address"),
        }
    }
}

impl<L: MotorLink> Drop for Session<L> {
    fn drop(&mut self) {
        // 任何退出路径都要让电机回到安全状态
        self.disconnect();
    }
}
