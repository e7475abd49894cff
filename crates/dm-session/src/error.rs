//! 会话层错误类型定义
//!
//! 生命周期错误（connect / enable / 重编址）同步返回给调用方——它们
//! 决定能否继续推进到使能态；停机路径上的错误只记录不重抛。

use dm_link::{ControlMode, LinkError};
use thiserror::Error;

/// 会话层错误类型
#[derive(Error, Debug)]
pub enum SessionError {
    /// CAN ID 超出 0x01..=0x7F
    #[error("CAN id {0:#04X} outside 0x01..=0x7F")]
    InvalidCanId(u8),

    /// 链路/传输错误
    #[error("link error: {0}")]
    Transport(#[from] LinkError),

    /// 电机拒绝了模式切换（链路已耗尽自身重试）
    #[error("motor rejected switch to {0:?} mode")]
    ModeSwitchRejected(ControlMode),

    /// 使能前置条件不满足：会话不在速度模式
    #[error("enable requires velocity mode (session is in {0:?} mode)")]
    NotVelocityMode(ControlMode),

    /// 电机未使能时下发了速度指令
    #[error("velocity command while motor disabled")]
    NotEnabled,

    /// 会话已拆除，不可再发起任何交换
    #[error("session is torn down")]
    TornDown,

    /// 循环配置非法
    #[error("invalid loop config: {0}")]
    Config(String),

    /// 重编址流程失败
    #[error(transparent)]
    Readdress(#[from] ReaddressError),
}

/// 重编址（改写总线地址并持久化）失败的细分
///
/// 写失败与保存失败的恢复路径不同，必须区分上报：写失败时电机
/// 状态未变；保存失败时易失地址与非易失地址已经不一致。
#[derive(Error, Debug)]
pub enum ReaddressError {
    /// 新地址超出协议区间
    #[error("new CAN id {0:#04X} outside 0x01..=0x7F")]
    InvalidId(u8),

    /// 电机拒绝了 ESC_ID 写入；未尝试保存，使能状态已恢复
    #[error("motor rejected ESC_ID write; nothing persisted")]
    WriteRejected,

    /// ESC_ID 写入成功但保存被拒绝；易失与非易失地址不一致
    #[error("parameter save rejected after ESC_ID write; volatile and persisted address out of sync")]
    SaveRejected,

    /// 写入阶段链路出错；未尝试保存，使能状态已尽力恢复
    #[error("link error during ESC_ID write: {0}")]
    WriteFailed(LinkError),

    /// 保存阶段链路出错；易失地址已改、持久化结果未知，会话已拆除
    #[error("link error during parameter save (volatile address already changed): {0}")]
    SaveFailed(LinkError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SessionError::ModeSwitchRejected(ControlMode::Velocity);
        assert!(format!("{err}").contains("Velocity"));

        let err = SessionError::NotVelocityMode(ControlMode::Mit);
        assert!(format!("{err}").contains("Mit"));

        let err = SessionError::from(ReaddressError::SaveRejected);
        assert!(format!("{err}").contains("out of sync"));

        // 写阶段与保存阶段的链路错误必须能从错误本身区分开
        let write = format!("{}", ReaddressError::WriteFailed(LinkError::Timeout));
        let save = format!("{}", ReaddressError::SaveFailed(LinkError::Timeout));
        assert!(write.contains("write"));
        assert!(save.contains("save"));
        assert_ne!(write, save);
    }

    #[test]
    fn test_from_link_error() {
        let err: SessionError = LinkError::Timeout.into();
        assert!(matches!(err, SessionError::Transport(LinkError::Timeout)));
    }
}
