//! 超声波轮询调度器
//!
//! 多个超声波传感器共享同一声学介质（空气），同时发声会互相干扰。调度器
//! 维护所有存活传感器的注册表，并在自动模式下运行单个后台线程，按轮转顺序
//! 依次触发传感器。
//!
//! # 状态
//!
//! - **Manual**: 轮询线程停止，传感器可手动 `ping()`
//! - **Automatic**: 轮询线程运行
//!
//! # 拓扑修改协议
//!
//! 注册/注销传感器时（[`Ultrasonic`](crate::Ultrasonic) 构造与 Drop）：
//! 1. 记录当前模式
//! 2. 强制切到 Manual（join 轮询线程）
//! 3. 持注册表锁修改注册表
//! 4. 注册表非空且原模式为 Automatic 时重新启动轮询线程
//!
//! 整个过程在模式锁内完成，轮询线程永远不会观察到迭代中途的注册表修改。
//!
//! # 作用域
//!
//! 每个 `Scheduler` 是独立的调度域（测试中每个用例可以创建自己的实例）。
//! [`Scheduler::global()`] 提供进程级默认实例，生命周期与进程相同；
//! 需要自定义配置时在第一次使用前调用 [`Scheduler::init_global()`]。
//! 进程级实例没有显式析构，调用 `set_automatic_mode(false)` 即可停止其线程。

use crate::config::SchedulerConfig;
use crate::error::DeviceError;
use crate::hooks::{HookManager, PingCallback};
use crate::metrics::{MetricsSnapshot, SchedulerMetrics};
use crate::mode::{AtomicPollerMode, PollerMode};
use crate::poller::PollerHandle;
use crate::registry::{Registry, SensorHandle, SensorRecord};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::{debug, error, info};

static GLOBAL: OnceLock<Scheduler> = OnceLock::new();

/// 调度器共享状态（控制线程与轮询线程共享）
pub(crate) struct SchedulerState {
    /// 传感器注册表（只在短临界区内持锁）
    pub(crate) registry: Mutex<Registry>,
    /// 当前模式（轮询线程每次迭代读取）
    pub(crate) mode: AtomicPollerMode,
    pub(crate) config: SchedulerConfig,
    pub(crate) metrics: SchedulerMetrics,
    /// Ping 回调（轮询线程无锁读取）
    pub(crate) hooks: ArcSwap<HookManager>,
    /// 最近一次自动 ping 的时刻（跨启停保持间隔）
    pub(crate) last_ping: Mutex<Option<Instant>>,
    /// 已创建的传感器实例数（使用统计）
    pub(crate) instances: AtomicU64,
}

struct SchedulerInner {
    state: Arc<SchedulerState>,
    /// 模式锁：持有轮询线程句柄，所有模式切换都在锁内完成
    poller: Mutex<Option<PollerHandle>>,
}

impl SchedulerInner {
    fn transition(
        &self,
        poller: &mut Option<PollerHandle>,
        target: PollerMode,
    ) -> Result<(), DeviceError> {
        let current = self.state.mode.get(Ordering::Acquire);
        if current == target {
            debug!("Ultrasonic scheduler already in {:?} mode", target);
            return Ok(());
        }

        match target {
            PollerMode::Automatic => self.start_locked(poller),
            PollerMode::Manual => {
                self.stop_locked(poller);
                Ok(())
            },
        }
    }

    fn start_locked(&self, poller: &mut Option<PollerHandle>) -> Result<(), DeviceError> {
        // 上一个线程必须已经完全停止
        assert!(
            poller.is_none(),
            "ultrasonic poller started while a previous poller is still alive"
        );

        // 清零所有计数器，使之前的数据失效
        let reset = self.state.registry.lock().reset_all_counters();
        self.state.metrics.counter_resets.fetch_add(1, Ordering::Relaxed);

        self.state.mode.set(PollerMode::Automatic, Ordering::Release);
        match PollerHandle::spawn(self.state.clone()) {
            Ok(handle) => {
                *poller = Some(handle);
                info!(
                    "Ultrasonic automatic mode enabled ({} sensors, {} counters reset)",
                    self.state.registry.lock().len(),
                    reset
                );
                Ok(())
            },
            Err(e) => {
                self.state.mode.set(PollerMode::Manual, Ordering::Release);
                error!("Failed to enable ultrasonic automatic mode: {}", e);
                Err(e)
            },
        }
    }

    fn stop_locked(&self, poller: &mut Option<PollerHandle>) {
        // Release: 轮询线程看到 Manual 后退出
        self.state.mode.set(PollerMode::Manual, Ordering::Release);

        if let Some(handle) = poller.take() {
            handle.stop(self.state.config.stop_timeout(), &self.state.metrics);
        }

        // 轮询已停止，进行中的测量不再被服务，清零所有计数器
        let reset = self.state.registry.lock().reset_all_counters();
        self.state.metrics.counter_resets.fetch_add(1, Ordering::Relaxed);
        self.state.metrics.poller_stops.fetch_add(1, Ordering::Relaxed);
        info!(
            "Ultrasonic automatic mode disabled ({} counters reset)",
            reset
        );
    }

    /// 从注册表删除，返回剩余数量
    ///
    /// # Panics
    ///
    /// 句柄不在注册表中（注册表不变量被破坏）。
    fn remove_registered(&self, handle: SensorHandle) -> usize {
        let mut registry = self.state.registry.lock();
        if let Err(e) = registry.remove(handle) {
            panic!("ultrasonic registry invariant violated: {}", e);
        }
        registry.len()
    }
}

impl Drop for SchedulerInner {
    fn drop(&mut self) {
        let poller = self.poller.get_mut();
        if poller.is_some() {
            self.state.mode.set(PollerMode::Manual, Ordering::Release);
            if let Some(handle) = poller.take() {
                handle.stop(self.state.config.stop_timeout(), &self.state.metrics);
            }
        }
    }
}

/// 超声波轮询调度器
///
/// 轻量句柄（内部为 `Arc`），克隆后指向同一个调度域。
///
/// # Example
///
/// ```
/// use rio_hal_devices::Scheduler;
///
/// let scheduler = Scheduler::new();
/// assert!(!scheduler.is_automatic());
///
/// // 没有传感器时也可以切换模式（线程发现注册表为空后自行退出）
/// scheduler.set_automatic_mode(true).unwrap();
/// assert!(scheduler.is_automatic());
/// scheduler.set_automatic_mode(false).unwrap();
/// assert!(!scheduler.is_automatic());
/// ```
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    /// 使用默认配置创建独立调度器
    pub fn new() -> Self {
        Self::from_valid_config(SchedulerConfig::default())
    }

    /// 使用自定义配置创建独立调度器
    ///
    /// # 错误
    /// - `DeviceError::Config`: 配置不合法
    pub fn with_config(config: SchedulerConfig) -> Result<Self, DeviceError> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: SchedulerConfig) -> Self {
        let state = SchedulerState {
            registry: Mutex::new(Registry::new()),
            mode: AtomicPollerMode::new(PollerMode::Manual),
            config,
            metrics: SchedulerMetrics::new(),
            hooks: ArcSwap::from_pointee(HookManager::new()),
            last_ping: Mutex::new(None),
            instances: AtomicU64::new(0),
        };
        Self {
            inner: Arc::new(SchedulerInner {
                state: Arc::new(state),
                poller: Mutex::new(None),
            }),
        }
    }

    /// 进程级默认调度器（首次调用时以默认配置创建）
    pub fn global() -> &'static Scheduler {
        GLOBAL.get_or_init(Scheduler::new)
    }

    /// 以指定配置初始化进程级调度器
    ///
    /// # 错误
    /// - `DeviceError::Config`: 配置不合法，或进程级调度器已经初始化
    pub fn init_global(config: SchedulerConfig) -> Result<&'static Scheduler, DeviceError> {
        config.validate()?;
        let mut config = Some(config);
        let scheduler = GLOBAL.get_or_init(|| {
            Scheduler::from_valid_config(config.take().unwrap_or_default())
        });
        if config.is_some() {
            return Err(DeviceError::Config(
                "global ultrasonic scheduler already initialized".to_string(),
            ));
        }
        Ok(scheduler)
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.state.config
    }

    /// 当前模式
    pub fn mode(&self) -> PollerMode {
        self.inner.state.mode.get(Ordering::Acquire)
    }

    /// 是否处于自动轮询模式
    pub fn is_automatic(&self) -> bool {
        self.mode().is_automatic()
    }

    /// 开启/关闭自动轮询模式
    ///
    /// - Manual → Automatic: 清零所有计数器，启动轮询线程
    /// - Automatic → Manual: 通知线程退出并 join（阻塞调用者直到线程结束），
    ///   然后清零所有计数器
    /// - 请求当前模式: 无操作
    ///
    /// # 错误
    /// - `DeviceError::PollerSpawn`: 无法创建轮询线程
    pub fn set_automatic_mode(&self, enabling: bool) -> Result<(), DeviceError> {
        let mut poller = self.inner.poller.lock();
        self.inner.transition(&mut poller, PollerMode::from_enabled(enabling))
    }

    /// 轮询线程是否存活
    ///
    /// 自动模式下注册表变空时线程会自行退出，此时模式仍为 Automatic。
    /// 不获取模式锁，可以在 [`PingCallback`] 中调用。
    pub fn is_poller_running(&self) -> bool {
        self.inner.state.metrics.active_pollers.load(Ordering::Acquire) > 0
    }

    /// 已注册的传感器数量
    pub fn sensor_count(&self) -> usize {
        self.inner.state.registry.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.registry.lock().is_empty()
    }

    /// 按轮询顺序列出已注册的传感器
    pub fn sensors(&self) -> Vec<SensorHandle> {
        self.inner.state.registry.lock().handles()
    }

    pub fn contains(&self, handle: SensorHandle) -> bool {
        self.inner.state.registry.lock().contains(handle)
    }

    /// 指标快照
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.state.metrics.snapshot()
    }

    /// 注册 ping 回调（下一次 ping 起生效）
    pub fn add_ping_callback(&self, callback: Arc<dyn PingCallback>) {
        self.inner.state.hooks.rcu(|hooks| {
            let mut hooks = HookManager::clone(hooks);
            hooks.add_callback(callback.clone());
            hooks
        });
    }

    /// 移除所有 ping 回调
    pub fn clear_ping_callbacks(&self) {
        self.inner.state.hooks.store(Arc::new(HookManager::new()));
    }

    /// 两个句柄是否指向同一个调度域
    pub fn same_domain(&self, other: &Scheduler) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// 注册传感器（拓扑修改协议）
    pub(crate) fn register(&self, record: SensorRecord) -> Result<SensorHandle, DeviceError> {
        let mut poller = self.inner.poller.lock();
        let original = self.mode();
        self.inner.transition(&mut poller, PollerMode::Manual)?;

        let handle = self.inner.state.registry.lock().insert(record);

        if let Err(e) = self.inner.transition(&mut poller, original) {
            // 恢复失败时回滚插入，调用方拿不到句柄
            self.inner.remove_registered(handle);
            return Err(e);
        }
        Ok(handle)
    }

    /// 注销传感器（拓扑修改协议）
    ///
    /// # Panics
    ///
    /// 句柄不在注册表中（注册表不变量被破坏，属于编程错误）。
    pub(crate) fn unregister(&self, handle: SensorHandle) -> Result<(), DeviceError> {
        let mut poller = self.inner.poller.lock();
        let original = self.mode();
        self.inner.transition(&mut poller, PollerMode::Manual)?;

        let remaining = self.inner.remove_registered(handle);
        if remaining > 0 && original.is_automatic() {
            self.inner.transition(&mut poller, PollerMode::Automatic)?;
        }
        Ok(())
    }

    /// 分配下一个实例序号（从 1 开始）
    pub(crate) fn next_instance(&self) -> u64 {
        self.inner.state.instances.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("mode", &self.mode())
            .field("sensors", &self.sensor_count())
            .field("config", self.config())
            .finish()
    }
}
