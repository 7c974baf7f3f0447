//! 异步 ping 录制器
//!
//! 基于有界 Channel 的 [`PingCallback`]，把轮询线程的每次 ping 转发给其他线程，
//! 用于验证相邻 ping 的最小间隔或离线分析时序。
//!
//! - **Bounded Queue**: 队列满时丢弃事件，不阻塞轮询线程
//! - **丢弃监控**: 提供 `dropped_events` 计数器
//!
//! ```rust
//! use rio_hal_devices::recording::AsyncPingRecorder;
//!
//! let (recorder, rx) = AsyncPingRecorder::with_capacity(64);
//! let dropped = recorder.dropped_events().clone();
//! assert!(rx.try_recv().is_err());
//! assert_eq!(dropped.load(std::sync::atomic::Ordering::Relaxed), 0);
//! ```

use crate::hooks::{PingCallback, PingEvent};
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// 默认队列容量（100ms 间隔下约 1.7 分钟）
pub const DEFAULT_CAPACITY: usize = 1024;

/// 异步 ping 录制器
pub struct AsyncPingRecorder {
    tx: Sender<PingEvent>,
    dropped_events: Arc<AtomicU64>,
    event_counter: Arc<AtomicU64>,
}

impl AsyncPingRecorder {
    /// 创建录制器（默认容量）
    ///
    /// # 返回
    ///
    /// - `(recorder, rx)`: 录制器和接收端
    #[must_use]
    pub fn new() -> (Self, Receiver<PingEvent>) {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> (Self, Receiver<PingEvent>) {
        let (tx, rx) = bounded(capacity);
        let recorder = Self {
            tx,
            dropped_events: Arc::new(AtomicU64::new(0)),
            event_counter: Arc::new(AtomicU64::new(0)),
        };
        (recorder, rx)
    }

    /// 丢弃计数器（队列满或接收端已关闭）
    #[must_use]
    pub fn dropped_events(&self) -> &Arc<AtomicU64> {
        &self.dropped_events
    }

    /// 成功入队的事件计数器
    #[must_use]
    pub fn event_counter(&self) -> &Arc<AtomicU64> {
        &self.event_counter
    }
}

impl PingCallback for AsyncPingRecorder {
    fn on_ping(&self, event: &PingEvent) {
        match self.tx.try_send(*event) {
            Ok(()) => {
                self.event_counter.fetch_add(1, Ordering::Relaxed);
            },
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
            },
        }
    }
}

/// 相邻两次 ping 的最小间隔
///
/// 少于两个事件时返回 `None`。
pub fn min_spacing(events: &[PingEvent]) -> Option<Duration> {
    events
        .windows(2)
        .map(|pair| pair[1].timestamp.saturating_duration_since(pair[0].timestamp))
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Registry, SensorRecord};
    use rio_hal_io::mock::{SimCounter, SimDigitalOutput};
    use std::sync::atomic::AtomicBool;
    use std::time::Instant;

    fn event_at(timestamp: Instant) -> PingEvent {
        let mut registry = Registry::new();
        let handle = registry.insert(SensorRecord {
            ping: Arc::new(SimDigitalOutput::new(0)),
            counter: Arc::new(SimCounter::new(1)),
            enabled: Arc::new(AtomicBool::new(true)),
        });
        PingEvent {
            handle,
            ping_channel: 0,
            timestamp,
        }
    }

    #[test]
    fn test_recorder_forwards_events() {
        let (recorder, rx) = AsyncPingRecorder::new();
        let event = event_at(Instant::now());
        recorder.on_ping(&event);

        assert_eq!(rx.try_recv().unwrap(), event);
        assert_eq!(recorder.event_counter().load(Ordering::Relaxed), 1);
        assert_eq!(recorder.dropped_events().load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_recorder_drops_when_full() {
        let (recorder, _rx) = AsyncPingRecorder::with_capacity(2);
        let event = event_at(Instant::now());
        for _ in 0..5 {
            recorder.on_ping(&event);
        }
        assert_eq!(recorder.event_counter().load(Ordering::Relaxed), 2);
        assert_eq!(recorder.dropped_events().load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_recorder_drops_when_disconnected() {
        let (recorder, rx) = AsyncPingRecorder::with_capacity(2);
        drop(rx);
        recorder.on_ping(&event_at(Instant::now()));
        assert_eq!(recorder.dropped_events().load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_min_spacing() {
        let t0 = Instant::now();
        let events = vec![
            event_at(t0),
            event_at(t0 + Duration::from_millis(100)),
            event_at(t0 + Duration::from_millis(130)),
        ];
        assert_eq!(min_spacing(&events), Some(Duration::from_millis(30)));
        assert_eq!(min_spacing(&events[..1]), None);
    }
}
