//! 设备层错误类型定义

use crate::registry::SensorHandle;
use rio_hal_io::IoError;
use thiserror::Error;

/// 设备层错误类型
#[derive(Error, Debug)]
pub enum DeviceError {
    /// IO 层错误（通道分配失败等）
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// 自动（轮询）模式下不允许手动 ping
    ///
    /// 手动模式与自动模式互斥，先调用 `set_automatic_mode(false)`。
    #[error("Manual ping is not allowed while automatic round-robin mode is active")]
    AutomaticModeActive,

    /// 不支持的 PID 源类型
    #[error("Unsupported PID source type: {0:?}")]
    InvalidPidSource(crate::pid::PidSourceType),

    /// 继电器方向不允许该输出值
    #[error("Relay value {value:?} not allowed for direction {direction:?}")]
    RelayDirection {
        value: crate::relay::RelayValue,
        direction: crate::relay::RelayDirection,
    },

    /// 轮询线程启动失败
    #[error("Failed to spawn poller thread: {0}")]
    PollerSpawn(String),

    /// 配置错误
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// 注册表不变量被破坏
///
/// 只会在编程错误时出现（句柄由 `Ultrasonic` 独占，正常流程下不可能重复删除），
/// 调度器遇到此错误时直接 panic。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// 在空注册表上删除
    #[error("Cannot remove {0:?}: sensor registry is empty")]
    Empty(SensorHandle),

    /// 句柄不在注册表中
    #[error("Sensor {0:?} is not registered")]
    NotRegistered(SensorHandle),
}
