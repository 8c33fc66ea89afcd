use super::*;

#[test]
fn test_timer_one_shot() {
    let mut timer = AppTimer::new();
    assert!(!timer.advance(10));

    timer.start(Millis::new(100), TimerMode::OneShot);
    assert!(timer.is_armed());
    assert!(!timer.advance(60));
    assert_eq!(timer.remaining(), Millis::new(40));
    assert!(timer.advance(40));
    assert!(!timer.is_armed());
    assert!(!timer.advance(1000));
}

#[test]
fn test_timer_repeat() {
    let mut timer = AppTimer::new();
    timer.start(Millis::new(50), TimerMode::Repeat);
    assert!(timer.advance(50));
    assert!(timer.is_armed());
    assert!(!timer.advance(49));
    assert!(timer.advance(1));
    timer.stop();
    assert!(!timer.advance(50));
}

#[test]
fn test_tick_accumulator() {
    static TICKS: TickAccumulator = TickAccumulator::new();
    TICKS.add(3);
    TICKS.add(7);
    assert_eq!(TICKS.take(), 10);
    assert_eq!(TICKS.take(), 0);
}

#[test]
fn test_task_set_priority_order() {
    let mut tasks = TaskSet::new();
    tasks.post(4);
    tasks.post(1);
    tasks.post(9);
    assert!(tasks.is_posted(4));
    assert_eq!(tasks.take_next(), Some(1));
    assert_eq!(tasks.take_next(), Some(4));
    tasks.clear(9);
    assert_eq!(tasks.take_next(), None);
    assert!(tasks.is_empty());
}

#[test]
fn test_status_codes() {
    assert_eq!(NwkStatus::InvalidRequest.code(), 0xC2);
    assert_eq!(NwkStatus::from(MacStatus::NoAck).code(), 0xE9);
    assert_eq!(NwkStatus::from(MacStatus::Success), NwkStatus::Success);
    assert_eq!(MacStatus::from_code(0xEA), Some(MacStatus::NoBeacon));
    assert_eq!(MacStatus::from_code(0x7F), None);
    assert_eq!(ApsStatus::SecurityFail.code(), 0xAD);
}

#[test]
fn test_capability_info() {
    let caps = CapabilityInfo::for_device(DeviceType::Router, false);
    assert_eq!(caps.bits(), 0x8E);
    let caps = CapabilityInfo::for_device(DeviceType::EndDevice, false);
    assert_eq!(caps.bits(), 0x80);
}

#[test]
#[should_panic(expected = "fatal assert 0x0001")]
fn test_fatal_assert_halts() {
    crate::sys_assert_fatal!(1 + 1 == 3, 0x0001u16);
}
