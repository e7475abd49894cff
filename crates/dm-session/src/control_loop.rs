//! 速度指令循环
//!
//! 有界节拍的实时循环：每个 tick 从速度源取目标、钳位到型号的速度
//! 包络、经会话转发，并按抽取率采集反馈。循环自身不承诺硬实时，
//! 只保证指令按发出顺序上线、失能状态下绝不发指令。
//!
//! 终止条件：停止标志、tick 数耗尽、指令交换出错。无论哪条退出
//! 路径，都会走强制停机序列（零速 → 稳定间隔 → 失能）——这是整个
//! 设计的核心安全属性。

use dm_link::{FeedbackSample, MotorLink};
use spin_sleep::SpinSleeper;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, trace, warn};

use crate::error::SessionError;
use crate::session::Session;
use crate::source::VelocitySource;

/// 循环配置
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// tick 周期（典型 1–10 ms）
    pub period: Duration,
    /// 每 N 个 tick 采集一次反馈用于观测
    pub feedback_every: usize,
    /// tick 数上限（`None` 表示直到停止标志）
    pub max_ticks: Option<usize>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        LoopConfig {
            period: Duration::from_millis(1),
            feedback_every: 200,
            max_ticks: None,
        }
    }
}

/// 一次循环运行的汇总
#[derive(Debug, Clone, Copy)]
pub struct LoopSummary {
    /// 实际完成的 tick 数
    pub ticks: usize,
    /// 停机前最后一次反馈采样
    pub last_feedback: Option<FeedbackSample>,
}

/// 运行速度指令循环
///
/// 阻塞调用。会话必须已处于使能态。`stop` 是协作式取消：每个 tick
/// 发指令前检查一次，置位后在下一 tick 生效，随后照常走停机序列。
///
/// 返回 `Ok(LoopSummary)`（正常终止）或首个指令错误（停机序列已
/// 执行完毕才返回）。停机序列自身的失败只记录，不覆盖首因。
pub fn run_velocity_loop<L, S>(
    session: &mut Session<L>,
    source: &mut S,
    config: &LoopConfig,
    stop: &AtomicBool,
) -> Result<LoopSummary, SessionError>
where
    L: MotorLink,
    S: VelocitySource,
{
    if config.period.is_zero() {
        return Err(SessionError::Config("period must be > 0".into()));
    }
    if config.feedback_every == 0 {
        return Err(SessionError::Config("feedback_every must be > 0".into()));
    }
    if !session.is_enabled() {
        return Err(SessionError::NotEnabled);
    }

    let limit = session.identity().model.velocity_limit();
    let sleeper = SpinSleeper::default();
    let start = Instant::now();
    let mut ticks = 0usize;
    let mut outcome: Result<(), SessionError> = Ok(());

    info!(period_us = config.period.as_micros() as u64, "velocity loop started");

    loop {
        if stop.load(Ordering::Relaxed) {
            info!(ticks, "stop requested");
            break;
        }
        if let Some(max) = config.max_ticks
            && ticks >= max
        {
            info!(ticks, "tick budget exhausted");
            break;
        }

        let target = source.next_target(start.elapsed());
        // 非有限目标按零处理
        let target = if target.is_finite() { target } else { 0.0 };
        let clamped = target.clamp(-limit, limit);

        match session.command_velocity(clamped) {
            Ok(sample) => {
                if feedback_due(ticks, config.feedback_every) {
                    trace!(
                        tick = ticks,
                        target = clamped,
                        velocity = sample.velocity,
                        torque = sample.torque,
                        "feedback"
                    );
                }
            }
            Err(e) => {
                // tick 边界截获，升级为停机序列而不是直接撕掉进程
                warn!(tick = ticks, error = %e, "command failed; escalating to shutdown");
                outcome = Err(e);
                break;
            }
        }

        ticks += 1;
        sleeper.sleep(config.period);
    }

    // 强制停机序列：零速 → 稳定间隔 → 失能。失败只记录——停机期间
    // 的优先级是把每个安全步骤都尝试一遍。
    if let Err(e) = session.disable() {
        warn!(error = %e, "shutdown sequence reported an error");
    }

    outcome.map(|()| LoopSummary {
        ticks,
        last_feedback: session.latest_feedback(),
    })
}

/// 反馈抽取：每 `every` 个 tick 采一次，从第 `every` 个 tick 开始
/// （tick 0 不采，避免首拍就产生一条观测）
fn feedback_due(tick: usize, every: usize) -> bool {
    (tick + 1) % every == 0
}
