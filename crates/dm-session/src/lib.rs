//! # DM 电机控制会话层
//!
//! 本 crate 是速度控制系统的核心：在外部链路（[`dm_link::MotorLink`]）
//! 之上实现
//!
//! - **会话管理器**（[`Session`]）：连接/模式配置、使能/失能安全状态
//!   机、重编址协议、任何退出路径上的安全停机；
//! - **指令循环**（[`run_velocity_loop`]）：有界节拍的速度指令流，
//!   钳位、反馈采样、强制停机序列；
//! - **交接原语**（[`SharedTarget`]）：展示层与循环线程之间的最新值
//!   单槽交接。
//!
//! 并发模型：每会话单一活动控制路径。所有上线交换都要求
//! `&mut Session`，指令循环与维护操作（重编址）由借用规则强制互斥；
//! 展示层只通过单槽交接与停止标志表达意图，从不直接改会话字段。

pub mod control_loop;
pub mod error;
pub mod event;
pub mod session;
pub mod source;

pub use control_loop::{LoopConfig, LoopSummary, run_velocity_loop};
pub use error::{ReaddressError, SessionError};
pub use event::SessionEvent;
pub use session::{ENABLE_SETTLE, EnableState, STOP_SETTLE, Session};
pub use source::{ConstantVelocity, SharedTarget, SineVelocity, VelocitySource};
