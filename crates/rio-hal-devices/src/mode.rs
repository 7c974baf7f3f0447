//! 轮询模式定义
//!
//! 定义超声波调度器的工作模式，用于控制轮询线程的生命周期。

use std::sync::atomic::{AtomicU8, Ordering};

/// 轮询模式
///
/// # 模式说明
///
/// - **Manual**: 手动模式（默认），轮询线程停止，传感器只能通过 `ping()` 单次测距
/// - **Automatic**: 自动模式，后台线程按轮转顺序依次触发每个已启用的传感器
///
/// 两种模式互斥：自动模式下调用 `ping()` 会返回错误。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum PollerMode {
    /// 手动模式（默认）
    #[default]
    Manual = 0,

    /// 自动轮询模式
    Automatic = 1,
}

impl PollerMode {
    /// 从 u8 转换
    ///
    /// 如果值无效，返回 Manual 模式。
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Automatic,
            _ => Self::Manual,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// 由布尔请求构造（`true` 表示自动模式）
    pub fn from_enabled(enabled: bool) -> Self {
        if enabled {
            Self::Automatic
        } else {
            Self::Manual
        }
    }

    pub fn is_automatic(self) -> bool {
        self == Self::Automatic
    }

    pub fn is_manual(self) -> bool {
        self == Self::Manual
    }
}

/// 轮询模式（原子版本，用于线程间共享）
///
/// 轮询线程每次迭代读取一次，控制线程通过 `set()` 请求退出。
/// 写入使用 `Release`，读取使用 `Acquire`。
#[derive(Debug)]
pub struct AtomicPollerMode {
    inner: AtomicU8,
}

impl AtomicPollerMode {
    pub fn new(mode: PollerMode) -> Self {
        Self {
            inner: AtomicU8::new(mode.as_u8()),
        }
    }

    pub fn get(&self, ordering: Ordering) -> PollerMode {
        PollerMode::from_u8(self.inner.load(ordering))
    }

    pub fn set(&self, mode: PollerMode, ordering: Ordering) {
        self.inner.store(mode.as_u8(), ordering);
    }
}

impl Default for AtomicPollerMode {
    fn default() -> Self {
        Self::new(PollerMode::Manual)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poller_mode_conversions() {
        assert_eq!(PollerMode::Manual.as_u8(), 0);
        assert_eq!(PollerMode::Automatic.as_u8(), 1);
        assert_eq!(PollerMode::from_u8(1), PollerMode::Automatic);
        assert_eq!(PollerMode::from_u8(7), PollerMode::Manual); // 无效值
        assert_eq!(PollerMode::from_enabled(true), PollerMode::Automatic);
        assert!(PollerMode::from_enabled(false).is_manual());
        assert!(PollerMode::default().is_manual());
    }

    #[test]
    fn test_atomic_poller_mode() {
        let mode = AtomicPollerMode::default();
        assert_eq!(mode.get(Ordering::Acquire), PollerMode::Manual);

        mode.set(PollerMode::Automatic, Ordering::Release);
        assert!(mode.get(Ordering::Acquire).is_automatic());
    }
}
