//! # RIO HAL Devices
//!
//! 设备层，基于 [`rio_hal_io`] 的 IO 原语提供传感器/执行器设备类：
//!
//! - [`Ultrasonic`]: 超声波测距传感器，以及负责多传感器轮转触发的 [`Scheduler`]
//! - [`AnalogAccelerometer`]: 单轴模拟加速度计
//! - [`AnalogPotentiometer`]: 模拟电位器
//! - [`Relay`]: 继电器
//!
//! 调度器的可观测性：
//! - 钩子系统（[`hooks`]）：每次自动 ping 后的回调
//! - 异步录制（[`recording`]）：把 ping 事件转发到其他线程
//! - 指标（[`metrics`]）：原子计数器
//!
//! # 使用场景
//!
//! 大多数用户应该通过 facade crate `rio-hal` 的 prelude 使用本 crate。

mod accelerometer;
pub mod config;
mod error;
pub mod hooks;
pub mod metrics;
pub mod mode;
pub mod pid;
mod poller;
mod potentiometer;
pub mod recording;
pub mod registry;
mod relay;
mod scheduler;
mod ultrasonic;

pub use accelerometer::{AnalogAccelerometer, DEFAULT_VOLTS_PER_G, DEFAULT_ZERO_G_VOLTAGE};
pub use config::SchedulerConfig;
pub use error::{DeviceError, RegistryError};
pub use hooks::{HookManager, PingCallback, PingEvent};
pub use metrics::{MetricsSnapshot, SchedulerMetrics};
pub use mode::{AtomicPollerMode, PollerMode};
pub use pid::{PidSource, PidSourceType};
pub use poller::POLLER_THREAD_NAME;
pub use potentiometer::AnalogPotentiometer;
pub use recording::AsyncPingRecorder;
pub use registry::SensorHandle;
pub use relay::{Relay, RelayDirection, RelayValue};
pub use scheduler::Scheduler;
pub use ultrasonic::{DistanceUnit, MM_PER_INCH, SPEED_OF_SOUND_INCHES_PER_SEC, Ultrasonic};
