//! 模拟电位器
//!
//! 把 0–5V 的模拟输入换算为角度（或任意单位）：
//! `value = 电压 / 5V 轨实际电压 × full_range + offset`。
//! 以 5V 轨实测电压归一化，可以抵消电源波动。

use crate::error::DeviceError;
use crate::pid::PidSource;
use rio_hal_io::{AnalogInput, IoBackend, PowerMonitor};
use std::sync::Arc;

/// 模拟电位器
pub struct AnalogPotentiometer {
    input: Arc<dyn AnalogInput>,
    power: Arc<dyn PowerMonitor>,
    full_range: f64,
    offset: f64,
}

impl AnalogPotentiometer {
    /// # 参数
    /// - `full_range`: 完整 0–5V 行程对应的值
    /// - `offset`: 0V 对应的值
    pub fn new(
        input: Arc<dyn AnalogInput>,
        power: Arc<dyn PowerMonitor>,
        full_range: f64,
        offset: f64,
    ) -> Self {
        Self {
            input,
            power,
            full_range,
            offset,
        }
    }

    /// 通过通道号分配模拟输入，默认量程 1.0、偏移 0.0
    pub fn from_channel(backend: &dyn IoBackend, channel: u32) -> Result<Self, DeviceError> {
        Self::from_channel_with_range(backend, channel, 1.0, 0.0)
    }

    pub fn from_channel_with_range(
        backend: &dyn IoBackend,
        channel: u32,
        full_range: f64,
        offset: f64,
    ) -> Result<Self, DeviceError> {
        let input = backend.analog_input(channel)?;
        Ok(Self::new(input, backend.power_monitor(), full_range, offset))
    }

    /// 当前值
    pub fn get(&self) -> f64 {
        self.input.voltage() / self.power.voltage_5v() * self.full_range + self.offset
    }

    pub fn channel(&self) -> u32 {
        self.input.channel()
    }
}

impl PidSource for AnalogPotentiometer {
    fn pid_get(&self) -> f64 {
        self.get()
    }
}
