//! 模拟加速度计
//!
//! 单轴模拟加速度计，输出电压与加速度成线性关系：
//! `g = (平均电压 - 零点电压) / 灵敏度`。

use crate::error::DeviceError;
use crate::pid::PidSource;
use rio_hal_io::{AnalogInput, IoBackend};
use std::sync::Arc;
use tracing::info;

/// 默认灵敏度（V/g）
pub const DEFAULT_VOLTS_PER_G: f64 = 1.0;
/// 默认零点电压（V）
pub const DEFAULT_ZERO_G_VOLTAGE: f64 = 2.5;

/// 模拟加速度计
pub struct AnalogAccelerometer {
    input: Arc<dyn AnalogInput>,
    volts_per_g: f64,
    zero_g_voltage: f64,
}

impl AnalogAccelerometer {
    /// 使用已有的模拟输入创建（输入可与其他代码共享）
    pub fn new(input: Arc<dyn AnalogInput>) -> Self {
        info!("Analog accelerometer on channel {}", input.channel());
        Self {
            input,
            volts_per_g: DEFAULT_VOLTS_PER_G,
            zero_g_voltage: DEFAULT_ZERO_G_VOLTAGE,
        }
    }

    /// 通过通道号分配模拟输入并创建
    pub fn from_channel(backend: &dyn IoBackend, channel: u32) -> Result<Self, DeviceError> {
        Ok(Self::new(backend.analog_input(channel)?))
    }

    /// 当前加速度（g）
    pub fn acceleration(&self) -> f64 {
        (self.input.average_voltage() - self.zero_g_voltage) / self.volts_per_g
    }

    /// 设置灵敏度（V/g，随型号不同）
    pub fn set_sensitivity(&mut self, volts_per_g: f64) {
        self.volts_per_g = volts_per_g;
    }

    /// 设置 0g 对应的电压
    pub fn set_zero(&mut self, zero_g_voltage: f64) {
        self.zero_g_voltage = zero_g_voltage;
    }

    pub fn channel(&self) -> u32 {
        self.input.channel()
    }
}

impl PidSource for AnalogAccelerometer {
    fn pid_get(&self) -> f64 {
        self.acceleration()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rio_hal_io::mock::SimBackend;

    #[test]
    fn test_acceleration_defaults() {
        let backend = SimBackend::new();
        let accel = AnalogAccelerometer::from_channel(&backend, 0).unwrap();
        let input = backend.sim_analog_input(0).unwrap();

        input.set_voltage(2.5);
        assert_eq!(accel.acceleration(), 0.0);
        input.set_voltage(3.5);
        assert_eq!(accel.acceleration(), 1.0);
        assert_eq!(accel.pid_get(), 1.0);
    }

    #[test]
    fn test_uses_average_voltage() {
        let backend = SimBackend::new();
        let accel = AnalogAccelerometer::from_channel(&backend, 1).unwrap();
        let input = backend.sim_analog_input(1).unwrap();

        input.set_voltage(4.0);
        input.set_average_voltage(2.0);
        assert_eq!(accel.acceleration(), -0.5);
    }

    #[test]
    fn test_sensitivity_and_zero() {
        let backend = SimBackend::new();
        let mut accel = AnalogAccelerometer::from_channel(&backend, 2).unwrap();
        accel.set_sensitivity(0.5);
        accel.set_zero(1.5);
        backend.sim_analog_input(2).unwrap().set_voltage(2.5);
        assert_eq!(accel.acceleration(), 2.0);
        assert_eq!(accel.channel(), 2);
    }

    #[test]
    fn test_channel_out_of_range() {
        let backend = SimBackend::new();
        assert!(matches!(
            AnalogAccelerometer::from_channel(&backend, 99),
            Err(DeviceError::Io(_))
        ));
    }
}
