//! RIO HAL - 机器人控制器硬件抽象层
//!
//! 在底层 IO 原语之上提供传感器/执行器设备类，核心是超声波传感器的轮转调度：
//! 任意数量共享同一声学介质的超声波传感器由后台线程依次触发，互不干扰。
//!
//! # 架构设计
//!
//! - **IO 层** (`io`): IO 原语 trait、通道分配、仿真后端（`mock` feature）
//! - **设备层** (`devices`): 超声波调度器、设备类、钩子与指标
//!
//! # 快速开始
//!
//! ```rust
//! use rio_hal::prelude::*;
//!
//! rio_hal::init_logging();
//!
//! let scheduler = Scheduler::new();
//! scheduler.set_automatic_mode(true)?;
//! scheduler.set_automatic_mode(false)?;
//! # Ok::<(), DeviceError>(())
//! ```

pub use rio_hal_devices as devices;
pub use rio_hal_io as io;

pub mod prelude;

pub use rio_hal_devices::{
    AnalogAccelerometer, AnalogPotentiometer, DeviceError, DistanceUnit, PidSource,
    PidSourceType, Relay, RelayDirection, RelayValue, Scheduler, SchedulerConfig, SensorHandle,
    Ultrasonic,
};
pub use rio_hal_io::{IoBackend, IoError};

use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` 未设置时的默认过滤规则
pub const DEFAULT_LOG_FILTER: &str = "rio_hal=info,rio_hal_devices=info,rio_hal_io=warn";

static LOGGING: Once = Once::new();

/// 初始化日志（`tracing` + `log` 桥接）
///
/// 过滤规则取自 `RUST_LOG`，未设置时使用 [`DEFAULT_LOG_FILTER`]。
/// 可以多次调用，只有第一次生效；如果宿主程序已经安装了全局 subscriber，
/// 保留宿主的设置。
pub fn init_logging() {
    init_logging_with_filter(DEFAULT_LOG_FILTER);
}

/// 使用指定的默认过滤规则初始化日志（`RUST_LOG` 优先）
pub fn init_logging_with_filter(default_filter: &str) {
    LOGGING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter));

        let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            tracing::debug!("Global tracing subscriber already installed, keeping it");
        }

        // 把 `log` 记录转发到 tracing
        if tracing_log::LogTracer::init_with_filter(log::LevelFilter::Trace).is_err() {
            tracing::debug!("Global logger already installed, log records are not bridged");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging();
        init_logging();
        init_logging_with_filter("trace");
        log::info!("bridged log record");
        tracing::info!("tracing record");
    }
}
