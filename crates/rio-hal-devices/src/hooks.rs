//! 钩子系统（Hook System）
//!
//! 在轮询线程每次触发 ping 后调用自定义回调，用于时序分析、录制和调试。
//!
//! # 设计原则
//!
//! - **非阻塞**: 回调在轮询线程中执行，必须尽快返回，推荐使用 Channel 异步处理
//! - **无锁读取**: 调度器用 `ArcSwap<HookManager>` 保存回调列表，轮询线程读取时不加锁
//!
//! # 使用示例
//!
//! ```rust
//! use rio_hal_devices::hooks::{HookManager, PingCallback};
//! use rio_hal_devices::recording::AsyncPingRecorder;
//! use std::sync::Arc;
//!
//! let mut hooks = HookManager::new();
//! let (recorder, _rx) = AsyncPingRecorder::new();
//! hooks.add_callback(Arc::new(recorder) as Arc<dyn PingCallback>);
//! assert_eq!(hooks.len(), 1);
//! ```

use crate::registry::SensorHandle;
use std::sync::Arc;
use std::time::Instant;

/// 一次自动模式 ping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingEvent {
    /// 被触发的传感器
    pub handle: SensorHandle,
    /// 触发通道号
    pub ping_channel: u32,
    /// 触发时刻（脉冲发出后立即采样）
    pub timestamp: Instant,
}

/// Ping 回调 Trait
///
/// # 性能要求
///
/// - 必须快速返回（轮询线程的间隔计时在回调之后开始）
/// - 禁止长时间阻塞（Mutex 争用、I/O）
/// - 推荐使用 `try_send` 转发到其他线程
pub trait PingCallback: Send + Sync {
    /// 轮询线程触发一次 ping 后调用
    fn on_ping(&self, event: &PingEvent);
}

/// 钩子管理器
///
/// 回调列表本身不是线程安全的，需要外部同步（调度器中通过 `ArcSwap` 整体替换）。
#[derive(Default, Clone)]
pub struct HookManager {
    callbacks: Vec<Arc<dyn PingCallback>>,
}

impl HookManager {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            callbacks: Vec::new(),
        }
    }

    pub fn add_callback(&mut self, callback: Arc<dyn PingCallback>) {
        self.callbacks.push(callback);
    }

    /// 移除所有回调
    pub fn clear(&mut self) {
        self.callbacks.clear();
    }

    /// 触发所有回调（在轮询线程中调用）
    pub fn trigger_all(&self, event: &PingEvent) {
        for callback in self.callbacks.iter() {
            callback.on_ping(event);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

impl std::fmt::Debug for HookManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookManager").field("callbacks", &self.callbacks.len()).finish()
    }
}
