//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use rio_hal::prelude::*;
//! ```

// 设备类
pub use rio_hal_devices::{
    AnalogAccelerometer, AnalogPotentiometer, DistanceUnit, Relay, RelayDirection, RelayValue,
    Ultrasonic,
};

// 调度器
pub use rio_hal_devices::{PollerMode, Scheduler, SchedulerConfig, SensorHandle};

// 常用 Trait
pub use rio_hal_devices::{PidSource, PingCallback};
pub use rio_hal_io::IoBackend;

// 错误类型
pub use rio_hal_devices::DeviceError;
pub use rio_hal_io::IoError;
