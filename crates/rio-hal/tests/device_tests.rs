//! 设备类集成测试（通过 facade 使用仿真后端）

use proptest::prelude::*;
use rio_hal::io::ChannelKind;
use rio_hal::io::mock::SimBackend;
use rio_hal::prelude::*;
use std::time::Duration;

#[test]
fn test_devices_share_backend_channels() {
    let scheduler = Scheduler::new();
    let backend = SimBackend::new();

    let ultrasonic =
        Ultrasonic::from_channels(&scheduler, &backend, 0, 1, DistanceUnit::Inches).unwrap();
    let accel = AnalogAccelerometer::from_channel(&backend, 0).unwrap();
    let pot = AnalogPotentiometer::from_channel(&backend, 1).unwrap();
    let relay = Relay::from_channel(&backend, 0, RelayDirection::Both).unwrap();

    assert!(backend.is_allocated(ChannelKind::Digital, 1));
    assert!(backend.is_allocated(ChannelKind::Analog, 0));
    assert!(backend.is_allocated(ChannelKind::Relay, 0));

    // 数字通道 1 已被回波计数器占用
    let err = Ultrasonic::from_channels(&scheduler, &backend, 1, 2, DistanceUnit::Inches)
        .unwrap_err();
    assert!(matches!(err, DeviceError::Io(IoError::ChannelInUse { .. })));

    backend.sim_analog_input(0).unwrap().set_voltage(2.5);
    backend.sim_analog_input(1).unwrap().set_voltage(5.0);
    relay.set(RelayValue::Forward).unwrap();

    let sources: [&dyn PidSource; 3] = [&ultrasonic, &accel, &pot];
    let values: Vec<f64> = sources.iter().map(|s| s.pid_get()).collect();
    assert_eq!(values, vec![0.0, 0.0, 1.0]);
    assert_eq!(relay.get(), RelayValue::Forward);
}

#[test]
fn test_manual_ping_then_echo() {
    let scheduler = Scheduler::new();
    let backend = SimBackend::new();
    let sensor =
        Ultrasonic::from_channels(&scheduler, &backend, 4, 5, DistanceUnit::Millimeters).unwrap();
    let echo = backend.sim_counter(5).unwrap();
    backend.sim_output(4).unwrap().link_echo(&echo, Duration::from_millis(1));

    assert!(!sensor.is_range_valid());
    sensor.ping().unwrap();
    assert!(sensor.is_range_valid());

    let inches = 0.001 * rio_hal::devices::SPEED_OF_SOUND_INCHES_PER_SEC / 2.0;
    assert!((sensor.pid_get() - inches * 25.4).abs() < 1e-9);
}

#[test]
fn test_stale_reading_reports_zero_period() {
    let scheduler = Scheduler::with_config(SchedulerConfig {
        max_period_ms: 20,
        ..SchedulerConfig::default()
    })
    .unwrap();
    let backend = SimBackend::new();
    let sensor =
        Ultrasonic::from_channels(&scheduler, &backend, 0, 1, DistanceUnit::Inches).unwrap();

    backend.sim_counter(1).unwrap().simulate_echo(Duration::from_millis(5));
    assert!(sensor.range_inches() > 0.0);

    std::thread::sleep(Duration::from_millis(40));
    // 边沿计数仍然有效，但周期已过期
    assert!(sensor.is_range_valid());
    assert_eq!(sensor.range_inches(), 0.0);
}

proptest! {
    #[test]
    fn prop_validity_gating(edges in 0u32..6, width_us in 100u64..30_000) {
        let scheduler = Scheduler::new();
        let backend = SimBackend::new();
        let sensor = Ultrasonic::from_channels(&scheduler, &backend, 0, 1, DistanceUnit::Inches)
            .unwrap();
        let counter = backend.sim_counter(1).unwrap();
        counter.set_period(Duration::from_micros(width_us));
        counter.add_edges(edges);

        prop_assert_eq!(sensor.is_range_valid(), edges >= 2);
        if edges < 2 {
            prop_assert_eq!(sensor.range_inches(), 0.0);
            prop_assert_eq!(sensor.range_mm(), 0.0);
        } else {
            prop_assert!(sensor.range_inches() > 0.0);
        }
        prop_assert!((sensor.range_mm() - sensor.range_inches() * 25.4).abs() < 1e-9);
    }
}
