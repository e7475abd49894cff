//! 速度目标来源
//!
//! 指令循环每个 tick 从 `VelocitySource` 拉取一个目标值（rad/s）。
//! 展示层（GUI/CLI）通过 `SharedTarget` 单槽交接最新意图，循环按
//! 自己的节拍读取，互不牵制。

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// 速度目标源
///
/// `elapsed` 是循环启动以来的时间，时间函数型的源（如正弦）据此取值。
pub trait VelocitySource {
    fn next_target(&mut self, elapsed: Duration) -> f64;
}

/// 正弦速度曲线：`amplitude * sin(angular_frequency * t)`
#[derive(Debug, Clone, Copy)]
pub struct SineVelocity {
    /// 幅值（rad/s）
    pub amplitude: f64,
    /// 角频率（rad/s）
    pub angular_frequency: f64,
}

impl SineVelocity {
    pub fn new(amplitude: f64, angular_frequency: f64) -> Self {
        Self {
            amplitude,
            angular_frequency,
        }
    }
}

impl VelocitySource for SineVelocity {
    fn next_target(&mut self, elapsed: Duration) -> f64 {
        self.amplitude * (self.angular_frequency * elapsed.as_secs_f64()).sin()
    }
}

/// 恒定速度目标
#[derive(Debug, Clone, Copy)]
pub struct ConstantVelocity(pub f64);

impl VelocitySource for ConstantVelocity {
    fn next_target(&mut self, _elapsed: Duration) -> f64 {
        self.0
    }
}

/// 最新值单槽交接
///
/// 速度目标不排队，只有最新值有意义。f64 以位存进 AtomicU64，
/// 写端（UI 线程）和读端（循环线程）各持一份克隆。
#[derive(Debug, Clone, Default)]
pub struct SharedTarget {
    bits: Arc<AtomicU64>,
}

impl SharedTarget {
    pub fn new(initial: f64) -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(initial.to_bits())),
        }
    }

    /// 发布新目标，覆盖旧值
    pub fn store(&self, rad_s: f64) {
        self.bits.store(rad_s.to_bits(), Ordering::SeqCst);
    }

    /// 读取最近发布的目标
    pub fn load(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }
}

impl VelocitySource for SharedTarget {
    fn next_target(&mut self, _elapsed: Duration) -> f64 {
        self.load()
    }
}
