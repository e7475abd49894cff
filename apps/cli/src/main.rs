//! # DM CLI
//!
//! 速度控制会话的命令行驱动：连接 → 使能 → 速度曲线 → 安全停机，
//! 以及重编址维护流程。
//!
//! ```bash
//! # 正弦速度曲线，Ctrl+C 随时安全停机
//! dm-cli run --amplitude 8.0
//!
//! # 恒定速度跑 5 秒
//! dm-cli run --target 4.0 --seconds 5
//!
//! # 把电机从地址 1 改到 2 并持久化
//! dm-cli readdress --new-id 2
//! ```
//!
//! 链路后端：仓内只带无硬件的模拟链路（联调、CI 用）；真实的
//! CAN-over-serial 链路由外部 crate 实现 [`dm_link::MotorLink`] 接入。

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use dm_link::mock::MockLink;
use dm_link::{MotorIdentity, MotorModel, ParamId};
use dm_session::{
    ConstantVelocity, LoopConfig, Session, SineVelocity, run_velocity_loop,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::info;

/// DM CLI - 单电机速度控制工具
#[derive(Parser, Debug)]
#[command(name = "dm-cli")]
#[command(about = "Velocity-control session driver for DM-series actuators", long_about = None)]
#[command(version)]
struct Cli {
    /// 电机从机地址（CAN ID）
    #[arg(long, default_value_t = 0x01)]
    can_id: u8,

    /// 主机地址
    #[arg(long, default_value_t = 0x11)]
    master_id: u8,

    /// 电机型号
    #[arg(long, value_enum, default_value_t = ModelArg::Dm4310)]
    model: ModelArg,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 运行速度指令循环
    Run {
        /// 恒定目标速度（rad/s）；缺省时使用正弦曲线
        #[arg(long)]
        target: Option<f64>,

        /// 正弦幅值（rad/s）
        #[arg(long, default_value_t = 8.0)]
        amplitude: f64,

        /// 正弦角频率（rad/s）
        #[arg(long, default_value_t = 1.0)]
        frequency: f64,

        /// tick 周期（毫秒）
        #[arg(long, default_value_t = 1)]
        period_ms: u64,

        /// 运行时长（秒）；缺省时一直跑到 Ctrl+C
        #[arg(long)]
        seconds: Option<f64>,

        /// 每 N 个 tick 打印一次反馈
        #[arg(long, default_value_t = 200)]
        feedback_every: usize,
    },

    /// 改写电机总线地址并持久化（维护操作）
    Readdress {
        /// 新的从机地址，1..=0x7F
        #[arg(long)]
        new_id: u8,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModelArg {
    Dm4310,
    Dm4340,
    Dm6006,
}

impl From<ModelArg> for MotorModel {
    fn from(arg: ModelArg) -> Self {
        match arg {
            ModelArg::Dm4310 => MotorModel::Dm4310,
            ModelArg::Dm4340 => MotorModel::Dm4340,
            ModelArg::Dm6006 => MotorModel::Dm6006,
        }
    }
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dm_cli=info".parse()?)
                .add_directive("dm_session=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let identity = MotorIdentity::new(cli.can_id, cli.master_id, cli.model.into());

    match cli.command {
        Commands::Run {
            target,
            amplitude,
            frequency,
            period_ms,
            seconds,
            feedback_every,
        } => run(
            identity,
            target,
            amplitude,
            frequency,
            period_ms,
            seconds,
            feedback_every,
        ),
        Commands::Readdress { new_id } => readdress(identity, new_id),
    }
}

fn run(
    identity: MotorIdentity,
    target: Option<f64>,
    amplitude: f64,
    frequency: f64,
    period_ms: u64,
    seconds: Option<f64>,
    feedback_every: usize,
) -> Result<()> {
    let mut session = Session::connect(identity, MockLink::new())?;

    // 状态事件转发到日志
    let events = session.events();
    std::thread::spawn(move || {
        for event in events.iter() {
            info!(?event, "session event");
        }
    });

    // 连接后照例读一轮铭牌参数
    for param in [
        ParamId::SubVer,
        ParamId::GearRatio,
        ParamId::PMax,
        ParamId::MasterId,
        ParamId::VMax,
        ParamId::TMax,
    ] {
        if let Some(value) = session.read_param(param)? {
            info!(?param, value, "motor parameter");
        }
    }

    // Ctrl+C → 协作式停止标志；循环在下一 tick 停下并走停机序列
    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::SeqCst);
    })?;

    session.enable()?;

    let period = Duration::from_millis(period_ms.max(1));
    let config = LoopConfig {
        period,
        feedback_every: feedback_every.max(1),
        max_ticks: seconds.map(|s| (s.max(0.0) / period.as_secs_f64()) as usize),
    };

    let summary = match target {
        Some(rad_s) => {
            info!(rad_s, "running constant-velocity loop");
            run_velocity_loop(&mut session, &mut ConstantVelocity(rad_s), &config, &stop)?
        }
        None => {
            info!(amplitude, frequency, "running sine-velocity loop");
            let mut source = SineVelocity::new(amplitude, frequency);
            run_velocity_loop(&mut session, &mut source, &config, &stop)?
        }
    };

    info!(ticks = summary.ticks, "loop finished");
    if let Some(sample) = summary.last_feedback {
        info!(
            velocity = sample.velocity,
            torque = sample.torque,
            "last feedback"
        );
    }

    session.disconnect();
    Ok(())
}

fn readdress(identity: MotorIdentity, new_id: u8) -> Result<()> {
    let link = MockLink::new();
    let bus = link.clone();

    let mut session = Session::connect(identity, link)?;
    session.readdress(new_id)?;
    info!(
        old = identity.can_id,
        new = new_id,
        "CAN id persisted; reconnecting under new identity"
    );

    // 旧会话已拆除，用新地址重建并验证
    let new_identity = MotorIdentity::new(new_id, identity.master_id, identity.model);
    let mut session = Session::connect(new_identity, bus)?;
    if let Some(esc_id) = session.read_param(ParamId::EscId)? {
        info!(esc_id, "verified ESC_ID under new session");
    }
    session.disconnect();
    Ok(())
}
