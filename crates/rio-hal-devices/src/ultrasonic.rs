//! 超声波测距传感器
//!
//! 一个超声波传感器由一个触发通道（数字输出）和一个回波通道（半周期模式的
//! 边沿计数器）组成。触发后传感器发出声波，回波脉冲的高电平宽度即声波往返
//! 时间，距离 = 时间 × 声速 / 2。
//!
//! 多个传感器同时工作时会互相干扰，因此所有实例都注册到一个
//! [`Scheduler`]，由它在自动模式下轮流触发。

use crate::error::DeviceError;
use crate::pid::PidSource;
use crate::registry::{SensorHandle, SensorRecord};
use crate::scheduler::Scheduler;
use rio_hal_io::{Counter, DigitalOutput, IoBackend};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info};

/// 声速（英寸/秒）：1130 ft/s × 12
pub const SPEED_OF_SOUND_INCHES_PER_SEC: f64 = 1130.0 * 12.0;

/// 每英寸毫米数
pub const MM_PER_INCH: f64 = 25.4;

/// PID 反馈使用的距离单位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceUnit {
    #[default]
    Inches,
    Millimeters,
}

/// 超声波测距传感器
///
/// 构造时注册到调度器，Drop 时注销。
///
/// # Example
///
/// ```ignore
/// use rio_hal_devices::{DistanceUnit, Scheduler, Ultrasonic};
///
/// let scheduler = Scheduler::global();
/// let front = Ultrasonic::from_channels(scheduler, &backend, 0, 1, DistanceUnit::Inches)?;
/// let rear = Ultrasonic::from_channels(scheduler, &backend, 2, 3, DistanceUnit::Inches)?;
/// scheduler.set_automatic_mode(true)?;
///
/// if front.is_range_valid() {
///     println!("front: {:.1} in", front.range_inches());
/// }
/// ```
pub struct Ultrasonic {
    scheduler: Scheduler,
    handle: SensorHandle,
    ping: Arc<dyn DigitalOutput>,
    counter: Arc<dyn Counter>,
    enabled: Arc<AtomicBool>,
    units: DistanceUnit,
}

impl Ultrasonic {
    /// 使用已有的触发通道和回波计数器创建传感器
    ///
    /// 计数器会被配置为半周期模式，最大周期取调度器配置；创建后传感器默认
    /// 参与轮询。调度器处于自动模式时，注册期间轮询线程会短暂停止并恢复。
    ///
    /// # 错误
    /// - `DeviceError::PollerSpawn`: 恢复自动模式时无法启动轮询线程
    pub fn new(
        scheduler: &Scheduler,
        ping: Arc<dyn DigitalOutput>,
        echo_counter: Arc<dyn Counter>,
        units: DistanceUnit,
    ) -> Result<Self, DeviceError> {
        echo_counter.set_max_period(scheduler.config().max_period());
        echo_counter.set_semi_period_mode(true);
        echo_counter.reset();

        let enabled = Arc::new(AtomicBool::new(true));
        let handle = scheduler.register(SensorRecord {
            ping: ping.clone(),
            counter: echo_counter.clone(),
            enabled: enabled.clone(),
        })?;

        let instance = scheduler.next_instance();
        info!(
            "Ultrasonic #{} registered (ping channel {}, {} sensors)",
            instance,
            ping.channel(),
            scheduler.sensor_count()
        );

        Ok(Self {
            scheduler: scheduler.clone(),
            handle,
            ping,
            counter: echo_counter,
            enabled,
            units,
        })
    }

    /// 通过通道号分配触发/回波通道并创建传感器
    ///
    /// # 错误
    /// - `DeviceError::Io`: 通道越界或已被占用
    /// - `DeviceError::PollerSpawn`: 同 [`Ultrasonic::new`]
    pub fn from_channels(
        scheduler: &Scheduler,
        backend: &dyn IoBackend,
        ping_channel: u32,
        echo_channel: u32,
        units: DistanceUnit,
    ) -> Result<Self, DeviceError> {
        let ping = backend.digital_output(ping_channel)?;
        let counter = backend.echo_counter(echo_channel)?;
        Self::new(scheduler, ping, counter, units)
    }

    /// 手动触发一次测距
    ///
    /// 清零计数器后发出一个触发脉冲，结果在回波返回后才可读
    /// （先检查 [`is_range_valid`](Self::is_range_valid)）。
    ///
    /// # 错误
    /// - `DeviceError::AutomaticModeActive`: 调度器处于自动模式
    pub fn ping(&self) -> Result<(), DeviceError> {
        if self.scheduler.is_automatic() {
            return Err(DeviceError::AutomaticModeActive);
        }
        self.counter.reset();
        self.ping.pulse(self.scheduler.config().ping_time());
        Ok(())
    }

    /// 是否已经测得有效距离（计数器至少记录到一个完整回波）
    pub fn is_range_valid(&self) -> bool {
        self.counter.get() > 1
    }

    /// 距离（英寸），无有效读数时为 0
    pub fn range_inches(&self) -> f64 {
        if self.is_range_valid() {
            self.counter.period().as_secs_f64() * SPEED_OF_SOUND_INCHES_PER_SEC / 2.0
        } else {
            0.0
        }
    }

    /// 距离（毫米），无有效读数时为 0
    pub fn range_mm(&self) -> f64 {
        self.range_inches() * MM_PER_INCH
    }

    /// 是否参与自动轮询
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// 设置是否参与自动轮询（下一轮生效）
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn distance_units(&self) -> DistanceUnit {
        self.units
    }

    pub fn set_distance_units(&mut self, units: DistanceUnit) {
        self.units = units;
    }

    /// 注册表句柄
    pub fn handle(&self) -> SensorHandle {
        self.handle
    }

    /// 所属调度器
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn ping_channel(&self) -> u32 {
        self.ping.channel()
    }
}

impl PidSource for Ultrasonic {
    /// 按当前单位返回距离
    fn pid_get(&self) -> f64 {
        match self.units {
            DistanceUnit::Inches => self.range_inches(),
            DistanceUnit::Millimeters => self.range_mm(),
        }
    }
}

impl Drop for Ultrasonic {
    fn drop(&mut self) {
        if let Err(e) = self.scheduler.unregister(self.handle) {
            error!(
                "Failed to restore ultrasonic automatic mode after removing {:?}: {}",
                self.handle, e
            );
        }
    }
}

impl fmt::Debug for Ultrasonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ultrasonic")
            .field("handle", &self.handle)
            .field("ping_channel", &self.ping.channel())
            .field("enabled", &self.is_enabled())
            .field("units", &self.units)
            .finish()
    }
}
