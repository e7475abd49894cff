//! 会话状态事件
//!
//! 面向展示层的状态变迁通知：只给内容，不管渲染。事件经
//! crossbeam 通道分发，没有订阅者时直接丢弃。

/// 会话状态变迁
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// 连接建立，模式已配置，力矩输出关闭
    Connected,
    /// 力矩输出已打开
    Enabled,
    /// 力矩输出已关闭
    Disabled,
    /// 会话已拆除（终态）
    TornDown,
}
