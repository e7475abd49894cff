//! # DM Motor Link 抽象层
//!
//! 定义上层（会话管理器、指令循环）消费的链路契约：帧编解码与
//! 请求/响应配对由具体链路实现负责，这里只暴露类型化的原语操作。
//!
//! 所有操作都是阻塞的，最坏耗时由链路自身的超时 x 重试预算界定。
//! 串行半双工：同一链路上同时至多一笔未完成的交换。

use thiserror::Error;

pub mod types;

pub use types::{
    CAN_ID_MAX, ControlMode, FeedbackSample, MotorIdentity, MotorModel, ParamId,
};

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "mock")]
pub use mock::{LinkCall, MockLink};

/// 链路层统一错误类型
#[derive(Error, Debug)]
pub enum LinkError {
    /// 字节流不可用或配置错误
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    /// 等待响应超时（已耗尽链路自身的重试预算）
    #[error("Response timeout")]
    Timeout,
    /// 电机未注册到链路
    #[error("Motor 0x{0:02X} not registered with link")]
    NotRegistered(u8),
    /// 链路/适配器内部错误
    #[error("Device error: {0}")]
    Device(String),
}

/// 电机链路契约
///
/// 实现方负责把类型化操作翻译为线上帧并完成交换；`enable`/`disable`
/// 在协议层没有显式成功标志，调用方需要用固定的稳定间隔兜底。
pub trait MotorLink {
    /// 向链路注册一台电机（解码器据此匹配反馈帧）
    fn register(&mut self, identity: &MotorIdentity) -> Result<(), LinkError>;

    /// 切换控制模式。链路内部自带有限次重试，`false` 表示电机拒绝。
    fn switch_mode(
        &mut self,
        identity: &MotorIdentity,
        mode: ControlMode,
    ) -> Result<bool, LinkError>;

    /// 使能力矩输出。无协议级 ACK。
    fn enable(&mut self, identity: &MotorIdentity) -> Result<(), LinkError>;

    /// 关闭力矩输出。无协议级 ACK。
    fn disable(&mut self, identity: &MotorIdentity) -> Result<(), LinkError>;

    /// 下发速度目标（rad/s），返回随响应帧捎带的反馈采样
    fn command_velocity(
        &mut self,
        identity: &MotorIdentity,
        rad_s: f64,
    ) -> Result<FeedbackSample, LinkError>;

    /// 读寄存器。`None` 表示电机没有应答有效值（链路已重试过）。
    fn read_param(
        &mut self,
        identity: &MotorIdentity,
        param: ParamId,
    ) -> Result<Option<f64>, LinkError>;

    /// 写易失寄存器。`false` 表示电机拒绝写入。
    fn write_param(
        &mut self,
        identity: &MotorIdentity,
        param: ParamId,
        value: f64,
    ) -> Result<bool, LinkError>;

    /// 把易失参数保存到非易失存储。
    ///
    /// 协议副作用：保存过程会使电机失能。
    fn save_params(&mut self, identity: &MotorIdentity) -> Result<bool, LinkError>;
}
