//! # RIO HAL IO Layer
//!
//! IO 原语硬件抽象层，为上层设备类提供统一的数字/模拟 IO 接口：
//!
//! - [`DigitalOutput`]: 数字输出（触发脉冲）
//! - [`Counter`]: 数字输入边沿计数器（周期/半周期测量）
//! - [`AnalogInput`]: 模拟输入（电压采样）
//! - [`PowerMonitor`]: 控制器电源监测（5V 轨）
//! - [`RelayOutput`]: 继电器正/反向输出
//!
//! 通道分配由 [`IoBackend`] 负责；启用 `mock` feature 后可使用
//! [`mock::SimBackend`] 在无硬件环境下测试。
//!
//! 所有原语都通过 `&self` 操作（内部可变），以便通过 `Arc` 在设备实例与
//! 后台轮询线程之间共享同一物理通道。

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[cfg(feature = "mock")]
pub mod mock;

/// IO 层统一错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IoError {
    #[error("{kind} channel {channel} out of range (max {max})")]
    ChannelOutOfRange {
        kind: ChannelKind,
        channel: u32,
        max: u32,
    },
    #[error("{kind} channel {channel} already allocated")]
    ChannelInUse { kind: ChannelKind, channel: u32 },
    #[error("Device error: {0}")]
    Device(String),
}

/// 通道类型（用于错误信息和通道分配）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Digital,
    Analog,
    Relay,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::Digital => write!(f, "Digital"),
            ChannelKind::Analog => write!(f, "Analog"),
            ChannelKind::Relay => write!(f, "Relay"),
        }
    }
}

/// 数字输出（脉冲触发）
pub trait DigitalOutput: Send + Sync {
    /// 物理通道号
    fn channel(&self) -> u32;

    /// 输出一个固定宽度的脉冲（发出即返回，无返回值）
    fn pulse(&self, width: Duration);
}

/// 边沿计数器
///
/// 在半周期模式下测量一次高电平（或低电平）持续时间。
/// 超过 `max_period` 未收到新边沿时，周期读数视为 0（过期）。
pub trait Counter: Send + Sync {
    /// 设置最大周期（超过则认为计数器已停止）
    fn set_max_period(&self, max_period: Duration);

    /// 启用/禁用半周期模式
    fn set_semi_period_mode(&self, high_semi_period: bool);

    /// 清零边沿计数和周期测量
    fn reset(&self);

    /// 累计边沿数
    fn get(&self) -> u32;

    /// 最近一次测量的周期
    fn period(&self) -> Duration;
}

/// 模拟输入
pub trait AnalogInput: Send + Sync {
    /// 物理通道号
    fn channel(&self) -> u32;

    /// 瞬时电压（V）
    fn voltage(&self) -> f64;

    /// 过采样平均电压（V）
    fn average_voltage(&self) -> f64;
}

/// 控制器电源监测
pub trait PowerMonitor: Send + Sync {
    /// 5V 传感器电源轨电压（V）
    fn voltage_5v(&self) -> f64;
}

/// 继电器输出（正向/反向两路）
pub trait RelayOutput: Send + Sync {
    /// 物理通道号
    fn channel(&self) -> u32;

    fn set_forward(&self, on: bool);
    fn set_reverse(&self, on: bool);
    fn forward(&self) -> bool;
    fn reverse(&self) -> bool;
}

/// IO 后端（通道分配器）
///
/// 每个物理通道只能分配一次；重复分配返回 [`IoError::ChannelInUse`]。
pub trait IoBackend {
    /// 分配数字输出通道
    fn digital_output(&self, channel: u32) -> Result<Arc<dyn DigitalOutput>, IoError>;

    /// 分配数字输入通道，并返回绑定在该通道上的计数器
    fn echo_counter(&self, channel: u32) -> Result<Arc<dyn Counter>, IoError>;

    /// 分配模拟输入通道
    fn analog_input(&self, channel: u32) -> Result<Arc<dyn AnalogInput>, IoError>;

    /// 分配继电器通道
    fn relay(&self, channel: u32) -> Result<Arc<dyn RelayOutput>, IoError>;

    /// 控制器电源监测
    fn power_monitor(&self) -> Arc<dyn PowerMonitor>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display() {
        let err = IoError::ChannelOutOfRange {
            kind: ChannelKind::Digital,
            channel: 42,
            max: 26,
        };
        assert_eq!(format!("{}", err), "Digital channel 42 out of range (max 26)");

        let err = IoError::ChannelInUse {
            kind: ChannelKind::Relay,
            channel: 3,
        };
        assert_eq!(format!("{}", err), "Relay channel 3 already allocated");

        let err = IoError::Device("fpga not ready".to_string());
        assert!(format!("{}", err).contains("fpga not ready"));
    }

    #[test]
    fn test_channel_kind_display() {
        assert_eq!(ChannelKind::Digital.to_string(), "Digital");
        assert_eq!(ChannelKind::Analog.to_string(), "Analog");
        assert_eq!(ChannelKind::Relay.to_string(), "Relay");
    }
}
