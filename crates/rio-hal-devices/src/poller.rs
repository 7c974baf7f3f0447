//! 轮询线程模块
//!
//! 负责后台轮转触发超声波传感器：每次迭代只触发一个传感器，随后等待一个
//! 传感器间隔，保证任意两个传感器的回波不会在时间上重叠。
//!
//! 线程的启停由 [`Scheduler`](crate::Scheduler) 控制，这里只包含循环本体和
//! 线程句柄。

use crate::error::DeviceError;
use crate::hooks::PingEvent;
use crate::metrics::SchedulerMetrics;
use crate::scheduler::SchedulerState;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, trace, warn};

/// 轮询线程名
pub const POLLER_THREAD_NAME: &str = "ultrasonic-checker";

/// join 失败原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JoinFailure {
    Panicked,
}

/// Extension trait for blocking joins that report slow shutdowns
trait JoinWatched {
    /// 阻塞直到线程结束；每超过 `warn_after` 仍未结束调用一次 `on_slow`
    fn join_watched(
        self,
        warn_after: Duration,
        on_slow: impl FnMut(u32),
    ) -> Result<(), JoinFailure>;
}

impl<T: Send + 'static> JoinWatched for JoinHandle<T> {
    fn join_watched(
        self,
        warn_after: Duration,
        mut on_slow: impl FnMut(u32),
    ) -> Result<(), JoinFailure> {
        let (tx, rx) = bounded(1);

        // Watchdog thread performs the blocking join
        std::thread::spawn(move || {
            let result = self.join();
            let _ = tx.send(result.is_ok());
        });

        let mut waited = 0u32;
        loop {
            match rx.recv_timeout(warn_after) {
                Ok(true) => return Ok(()),
                Ok(false) | Err(RecvTimeoutError::Disconnected) => {
                    return Err(JoinFailure::Panicked);
                },
                Err(RecvTimeoutError::Timeout) => {
                    waited += 1;
                    on_slow(waited);
                },
            }
        }
    }
}

/// 存活线程计数守卫（线程退出或 panic 时注销）
struct ActivePollerGuard<'a>(&'a SchedulerMetrics);

impl Drop for ActivePollerGuard<'_> {
    fn drop(&mut self) {
        self.0.poller_exited();
    }
}

/// 轮询线程句柄
///
/// 持有停止通道的发送端；Drop 发送端即可唤醒正在等待间隔的线程。
pub(crate) struct PollerHandle {
    thread: JoinHandle<()>,
    stop_tx: Sender<()>,
}

impl PollerHandle {
    /// 启动轮询线程
    pub(crate) fn spawn(state: Arc<SchedulerState>) -> Result<Self, DeviceError> {
        let (stop_tx, stop_rx) = bounded::<()>(1);

        state.metrics.poller_spawned();
        let thread_state = state.clone();
        let spawned = std::thread::Builder::new()
            .name(POLLER_THREAD_NAME.to_string())
            .spawn(move || ultrasonic_checker(thread_state, stop_rx));

        match spawned {
            Ok(thread) => Ok(Self { thread, stop_tx }),
            Err(e) => {
                state.metrics.poller_exited();
                Err(DeviceError::PollerSpawn(e.to_string()))
            },
        }
    }

    /// 唤醒线程并阻塞等待其完全退出
    ///
    /// 调用前必须已经把模式切回 Manual，否则线程在被唤醒后仍会继续循环。
    /// 线程卡在脉冲或回调中时不会放弃等待，每经过 `warn_after` 记录一次告警。
    pub(crate) fn stop(self, warn_after: Duration, metrics: &SchedulerMetrics) {
        let Self { thread, stop_tx } = self;
        drop(stop_tx);

        let joined = thread.join_watched(warn_after, |waited| {
            metrics.join_timeouts.fetch_add(1, Ordering::Relaxed);
            warn!(
                "Ultrasonic poller still running after {:?}, waiting for it to exit",
                warn_after * waited
            );
        });
        if joined == Err(JoinFailure::Panicked) {
            error!("Ultrasonic poller thread panicked");
        }
    }
}

/// 等待 `timeout`，期间收到停止信号返回 `true`
fn wait_for_stop(stop_rx: &Receiver<()>, timeout: Duration) -> bool {
    match stop_rx.recv_timeout(timeout) {
        Err(RecvTimeoutError::Timeout) => false,
        Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
    }
}

/// 轮询线程循环
///
/// 每次迭代：
/// 1. 检查模式，已切回 Manual 则退出
/// 2. 取出游标处的传感器（游标越界则回到队首；注册表为空则退出）
/// 3. 传感器已启用则发出触发脉冲，并通知钩子
/// 4. 游标前进，等待一个传感器间隔
///
/// 新线程启动时，如果距离上一次 ping 不足一个间隔，先补足剩余时间，
/// 因此多次启停之间相邻 ping 的间隔同样不小于 `ping_interval`。
///
/// 注册表只在持锁的短临界区内读取，脉冲和等待都在锁外进行。
pub(crate) fn ultrasonic_checker(state: Arc<SchedulerState>, stop_rx: Receiver<()>) {
    let _active = ActivePollerGuard(&state.metrics);

    #[cfg(feature = "realtime")]
    {
        use thread_priority::*;
        use tracing::info;

        match set_current_thread_priority(ThreadPriority::Max) {
            Ok(_) => {
                info!("Ultrasonic poller priority set to MAX (realtime)");
            },
            Err(e) => {
                warn!(
                    "Failed to set ultrasonic poller priority: {}. \
                    On Linux, you may need to run with CAP_SYS_NICE or use rtkit.",
                    e
                );
            },
        }
    }

    let ping_time = state.config.ping_time();
    let interval = state.config.ping_interval();

    let last_ping = *state.last_ping.lock();
    let holdoff = last_ping
        .map(|at| interval.saturating_sub(at.elapsed()))
        .unwrap_or_default();
    if !holdoff.is_zero() {
        trace!("Ultrasonic poller: holding off {:?} since last ping", holdoff);
        if wait_for_stop(&stop_rx, holdoff) {
            return;
        }
    }

    let mut cursor = 0usize;
    loop {
        // Acquire: 看到 Manual 时必须同时看到控制线程之前的写入
        if !state.mode.get(Ordering::Acquire).is_automatic() {
            trace!("Ultrasonic poller: automatic mode cleared, exiting");
            break;
        }

        let target = {
            let registry = state.registry.lock();
            if cursor >= registry.len() {
                cursor = 0;
            }
            registry.get(cursor).map(|(handle, record)| (handle, record.clone()))
        };

        let Some((handle, record)) = target else {
            debug!("Ultrasonic poller: no sensors registered, exiting");
            state.metrics.poller_idle_exits.fetch_add(1, Ordering::Relaxed);
            break;
        };

        if record.is_enabled() {
            record.ping.pulse(ping_time);
            let now = Instant::now();
            *state.last_ping.lock() = Some(now);
            state.metrics.pings_total.fetch_add(1, Ordering::Relaxed);
            trace!(
                "Ultrasonic poller: pinged {:?} on channel {}",
                handle,
                record.ping.channel()
            );

            state.hooks.load().trigger_all(&PingEvent {
                handle,
                ping_channel: record.ping.channel(),
                timestamp: now,
            });
        } else {
            state.metrics.pings_skipped.fetch_add(1, Ordering::Relaxed);
        }

        cursor += 1;
        if wait_for_stop(&stop_rx, interval) {
            trace!("Ultrasonic poller: stop signal received");
            break;
        }
    }
}
