//! 链路层公共类型
//!
//! 电机身份、控制模式、寄存器编号与反馈采样。数值与 DM 固件的
//! `Control_Type` / RID 表一一对应，不做任何换算。

use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::time::Instant;

/// 总线上合法从机地址的上界（7 bit CAN ID）
pub const CAN_ID_MAX: u8 = 0x7F;

/// 电机型号
///
/// 型号决定速度包络（可指令角速度的幅值上限）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotorModel {
    /// DM4310，DQ_MAX = 30 rad/s
    Dm4310,
    /// DM4340，低速大扭矩款
    Dm4340,
    /// DM6006
    Dm6006,
}

impl MotorModel {
    /// 速度包络：该型号可指令角速度的最大幅值（rad/s）
    pub fn velocity_limit(self) -> f64 {
        match self {
            MotorModel::Dm4310 => 30.0,
            MotorModel::Dm4340 => 10.0,
            MotorModel::Dm6006 => 45.0,
        }
    }
}

/// 电机身份
///
/// 一次会话期间不可变；改写 `can_id` 必须走重编址流程并重建会话。
/// 总线唯一性由操作者保证，协议本身不校验。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorIdentity {
    /// 电机的从机地址（CAN ID），1..=0x7F
    pub can_id: u8,
    /// 主机地址（电机反馈帧的目标 ID）
    pub master_id: u8,
    /// 型号
    pub model: MotorModel,
}

impl MotorIdentity {
    pub fn new(can_id: u8, master_id: u8, model: MotorModel) -> Self {
        Self {
            can_id,
            master_id,
            model,
        }
    }

    /// 地址是否在协议允许的 1..=0x7F 区间内
    pub fn can_id_valid(id: u8) -> bool {
        (1..=CAN_ID_MAX).contains(&id)
    }
}

/// 控制模式，对应 DM 固件的 `Control_Type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ControlMode {
    /// MIT 混合控制
    Mit = 1,
    /// 位置速度
    PositionVelocity = 2,
    /// 纯速度
    Velocity = 3,
}

/// 电机寄存器编号（DM 固件 RID 表的子集）
///
/// 只收录本系统实际读写的寄存器。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ParamId {
    /// 最大转速限制
    MaxSpeed = 6,
    /// 主机 ID
    MasterId = 7,
    /// 从机地址（CAN ID）；重编址即改写此寄存器
    EscId = 8,
    /// 当前控制模式
    CtrlMode = 10,
    /// 减速比
    GearRatio = 20,
    /// 位置幅值
    PMax = 21,
    /// 速度幅值
    VMax = 22,
    /// 力矩幅值
    TMax = 23,
    /// 固件子版本
    SubVer = 50,
}

/// 一次反馈采样
///
/// 任何携带遥测的指令交换都会产生一份；上层只保留最近一份。
#[derive(Debug, Clone, Copy)]
pub struct FeedbackSample {
    /// 当前角速度（rad/s）
    pub velocity: f64,
    /// 当前输出力矩（Nm）
    pub torque: f64,
    /// 采样时刻（单调时钟）
    pub sampled_at: Instant,
}
