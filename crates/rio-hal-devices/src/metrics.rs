//! 调度器指标模块
//!
//! 原子计数器，可以在任何线程读取，不引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// 超声波调度器实时指标
///
/// # 使用示例
///
/// ```rust
/// use rio_hal_devices::SchedulerMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = SchedulerMetrics::new();
/// metrics.pings_total.fetch_add(1, Ordering::Relaxed);
///
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.pings_total, 1);
/// ```
#[derive(Debug, Default)]
pub struct SchedulerMetrics {
    /// 自动模式下发出的 ping 总数
    pub pings_total: AtomicU64,

    /// 轮询到但处于禁用状态而跳过的次数
    pub pings_skipped: AtomicU64,

    /// 轮询线程启动次数
    pub poller_starts: AtomicU64,

    /// 轮询线程停止次数（由控制线程请求）
    pub poller_stops: AtomicU64,

    /// 注册表为空时轮询线程自行退出的次数
    pub poller_idle_exits: AtomicU64,

    /// 当前存活的轮询线程数（正常情况下只会是 0 或 1）
    pub active_pollers: AtomicU64,

    /// 历史上同时存活的轮询线程数峰值
    pub peak_active_pollers: AtomicU64,

    /// 批量清零计数器的次数（模式切换时）
    pub counter_resets: AtomicU64,

    /// 停止时等待轮询线程超过 `stop_timeout` 的告警次数（异常现象）
    pub join_timeouts: AtomicU64,
}

impl SchedulerMetrics {
    /// 创建新的指标实例（所有计数器初始化为 0）
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一个新的轮询线程
    pub(crate) fn poller_spawned(&self) {
        let active = self.active_pollers.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak_active_pollers.fetch_max(active, Ordering::AcqRel);
        self.poller_starts.fetch_add(1, Ordering::Relaxed);
    }

    /// 注销一个轮询线程（线程退出时调用）
    pub(crate) fn poller_exited(&self) {
        self.active_pollers.fetch_sub(1, Ordering::AcqRel);
    }

    /// 获取指标快照
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            pings_total: self.pings_total.load(Ordering::Relaxed),
            pings_skipped: self.pings_skipped.load(Ordering::Relaxed),
            poller_starts: self.poller_starts.load(Ordering::Relaxed),
            poller_stops: self.poller_stops.load(Ordering::Relaxed),
            poller_idle_exits: self.poller_idle_exits.load(Ordering::Relaxed),
            active_pollers: self.active_pollers.load(Ordering::Acquire),
            peak_active_pollers: self.peak_active_pollers.load(Ordering::Acquire),
            counter_resets: self.counter_resets.load(Ordering::Relaxed),
            join_timeouts: self.join_timeouts.load(Ordering::Relaxed),
        }
    }
}

/// 指标快照（普通数值，便于打印和断言）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub pings_total: u64,
    pub pings_skipped: u64,
    pub poller_starts: u64,
    pub poller_stops: u64,
    pub poller_idle_exits: u64,
    pub active_pollers: u64,
    pub peak_active_pollers: u64,
    pub counter_resets: u64,
    pub join_timeouts: u64,
}
