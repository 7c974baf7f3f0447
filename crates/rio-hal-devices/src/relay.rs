//! 继电器
//!
//! 一个继电器通道控制一对输出（正向/反向），可以全关、单向导通或双向导通，
//! 用于不需要调速的电机正反转，或把两路输出分别当作独立开关使用。

use crate::error::DeviceError;
use rio_hal_io::{IoBackend, RelayOutput};
use std::sync::Arc;
use tracing::debug;

/// 继电器允许的方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelayDirection {
    #[default]
    Both,
    ForwardOnly,
    ReverseOnly,
}

/// 继电器输出值
///
/// 单向继电器上 `On` 表示打开唯一允许的那一路；双向继电器上表示两路都打开。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayValue {
    Off,
    On,
    Forward,
    Reverse,
}

/// 继电器
pub struct Relay {
    output: Arc<dyn RelayOutput>,
    direction: RelayDirection,
}

impl Relay {
    /// 创建后两路输出都被关闭
    pub fn new(output: Arc<dyn RelayOutput>, direction: RelayDirection) -> Self {
        output.set_forward(false);
        output.set_reverse(false);
        Self { output, direction }
    }

    pub fn from_channel(
        backend: &dyn IoBackend,
        channel: u32,
        direction: RelayDirection,
    ) -> Result<Self, DeviceError> {
        Ok(Self::new(backend.relay(channel)?, direction))
    }

    /// 设置输出
    ///
    /// # 错误
    /// - `DeviceError::RelayDirection`: 单向继电器上请求了不允许的方向，输出保持不变
    pub fn set(&self, value: RelayValue) -> Result<(), DeviceError> {
        let forward_allowed = self.direction != RelayDirection::ReverseOnly;
        let reverse_allowed = self.direction != RelayDirection::ForwardOnly;

        let (forward, reverse) = match value {
            RelayValue::Off => (false, false),
            RelayValue::On => (forward_allowed, reverse_allowed),
            RelayValue::Forward if forward_allowed => (true, false),
            RelayValue::Reverse if reverse_allowed => (false, true),
            RelayValue::Forward | RelayValue::Reverse => {
                return Err(DeviceError::RelayDirection {
                    value,
                    direction: self.direction,
                });
            },
        };

        // 单向继电器不触碰另一路输出
        if forward_allowed {
            self.output.set_forward(forward);
        }
        if reverse_allowed {
            self.output.set_reverse(reverse);
        }
        debug!("Relay {}: set {:?}", self.output.channel(), value);
        Ok(())
    }

    /// 当前输出
    pub fn get(&self) -> RelayValue {
        let forward = self.output.forward();
        let reverse = self.output.reverse();
        match self.direction {
            RelayDirection::Both => match (forward, reverse) {
                (true, true) => RelayValue::On,
                (true, false) => RelayValue::Forward,
                (false, true) => RelayValue::Reverse,
                (false, false) => RelayValue::Off,
            },
            RelayDirection::ForwardOnly if forward => RelayValue::On,
            RelayDirection::ReverseOnly if reverse => RelayValue::On,
            _ => RelayValue::Off,
        }
    }

    pub fn direction(&self) -> RelayDirection {
        self.direction
    }

    /// 修改方向（先关闭输出）
    pub fn set_direction(&mut self, direction: RelayDirection) {
        if self.direction == direction {
            return;
        }
        self.output.set_forward(false);
        self.output.set_reverse(false);
        self.direction = direction;
    }

    pub fn channel(&self) -> u32 {
        self.output.channel()
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        self.output.set_forward(false);
        self.output.set_reverse(false);
    }
}
