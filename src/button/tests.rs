//! Unit tests for the button state machine and the bank manager.
//!
//! These tests run on the host and drive the engine with synthetic
//! timestamps, recording callbacks into a shared log.

use core::cell::{Cell, RefCell};
use core::convert::Infallible;

use embedded_hal::digital::{ErrorKind, ErrorType, InputPin};

use super::*;
use crate::error::Error;
use crate::timing::{Millis, TimingConfig};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Ev {
    Press(Millis),
    Release(Millis),
    Long(Millis),
}

/// Shared log plus one closure per callback kind.
struct Recorder {
    log: RefCell<Vec<(u16, Ev)>>,
}

impl Recorder {
    fn new() -> Self {
        Self {
            log: RefCell::new(Vec::new()),
        }
    }

    fn push(&self, tag: u16, ev: Ev) {
        self.log.borrow_mut().push((tag, ev));
    }

    fn events(&self) -> Vec<Ev> {
        self.log.borrow().iter().map(|&(_, ev)| ev).collect()
    }

    fn presses(&self) -> usize {
        self.count(|ev| matches!(ev, Ev::Press(_)))
    }

    fn count(&self, pred: impl Fn(&Ev) -> bool) -> usize {
        self.log.borrow().iter().filter(|(_, ev)| pred(ev)).count()
    }

    fn clear(&self) {
        self.log.borrow_mut().clear();
    }
}

/// Clock for callbacks that only receive a `ButtonRef`.
struct Clock(Cell<Millis>);

struct MockPin<'a> {
    level: &'a Cell<bool>,
}

impl ErrorType for MockPin<'_> {
    type Error = Infallible;
}

impl InputPin for MockPin<'_> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.level.get())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.level.get())
    }
}

struct DeadPin;

impl ErrorType for DeadPin {
    type Error = ErrorKind;
}

impl InputPin for DeadPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Err(ErrorKind::Other)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Err(ErrorKind::Other)
    }
}

/// Fast timing for scenario tests: no debounce, repeat 300/100, no long press.
fn repeat_timing() -> TimingConfig {
    TimingConfig::new()
        .debounce(0)
        .repeat_delay(300)
        .repeat_interval(100)
        .long_press(0)
}

// ═══════════════════════════════════════════════════════════════════════════
// ButtonStatus
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn status_flags_combine() {
    let status = ButtonStatus::CURRENT | ButtonStatus::DOWN;
    assert!(status.current());
    assert!(status.down());
    assert!(!status.up());
    assert_eq!(status.bits(), 0b11);
    assert!(ButtonStatus::empty().is_empty());
    assert_eq!(ButtonStatus::from_bits(0xFF).bits(), 0x1F);
}

// ═══════════════════════════════════════════════════════════════════════════
// Button::check / init_state
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn long_press_dispatches_long_then_press() {
    let rec = Recorder::new();
    let press = |b: ButtonRef| rec.push(b.tag, Ev::Press(b.held_ms));
    let long = |b: ButtonRef| rec.push(b.tag, Ev::Long(b.held_ms));

    let mut button = Button::bank(3).on_press(&press).on_long_press(&long);
    button.init_state(ButtonStatus::empty(), 0);
    button.check(ButtonStatus::CURRENT | ButtonStatus::DOWN, 100);
    button.check(ButtonStatus::CURRENT | ButtonStatus::LONG, 1_100);

    assert_eq!(
        rec.events(),
        vec![Ev::Press(0), Ev::Long(1_000), Ev::Press(1_000)]
    );
    assert!(rec.log.borrow().iter().all(|&(tag, _)| tag == 3));
}

#[test]
fn repeat_requires_repeat_flag() {
    let rec = Recorder::new();
    let press = |b: ButtonRef| rec.push(b.tag, Ev::Press(b.held_ms));

    let mut plain = Button::bank(0).on_press(&press);
    plain.init_state(ButtonStatus::empty(), 0);
    plain.check(ButtonStatus::CURRENT | ButtonStatus::DOWN, 0);
    plain.check(ButtonStatus::CURRENT | ButtonStatus::REPEAT, 500);
    assert_eq!(rec.presses(), 1);

    rec.clear();
    let mut repeating = Button::bank(0).repeat(true).on_press(&press);
    repeating.init_state(ButtonStatus::empty(), 0);
    repeating.check(ButtonStatus::CURRENT | ButtonStatus::DOWN, 0);
    repeating.check(ButtonStatus::CURRENT | ButtonStatus::REPEAT, 500);
    assert_eq!(rec.presses(), 2);
}

#[test]
fn repeat_and_long_ignored_while_idle() {
    let rec = Recorder::new();
    let press = |b: ButtonRef| rec.push(b.tag, Ev::Press(b.held_ms));
    let long = |b: ButtonRef| rec.push(b.tag, Ev::Long(b.held_ms));

    let mut button = Button::bank(0).repeat(true).on_press(&press).on_long_press(&long);
    button.init_state(ButtonStatus::empty(), 0);
    button.check(ButtonStatus::REPEAT | ButtonStatus::LONG, 100);
    assert!(rec.events().is_empty());
    assert!(!button.is_pressed());
}

#[test]
fn init_state_reports_startup_position() {
    let rec = Recorder::new();
    let press = |b: ButtonRef| rec.push(b.tag, Ev::Press(b.held_ms));
    let release = |b: ButtonRef| rec.push(b.tag, Ev::Release(b.held_ms));

    let mut held = Button::bank(0).on_press(&press).on_release(&release);
    held.init_state(ButtonStatus::CURRENT, 50);
    assert!(held.is_pressed());
    assert!(held.is_initialized());

    let mut idle = Button::bank(1).on_press(&press).on_release(&release);
    idle.init_state(ButtonStatus::empty(), 50);
    assert!(!idle.is_pressed());

    assert_eq!(rec.events(), vec![Ev::Press(0), Ev::Release(0)]);
}

#[test]
fn mirror_sink_follows_pressed_state() {
    let sink = Cell::new(false);
    let mut button = Button::bank(0).mirror_to(&sink);
    button.init_state(ButtonStatus::empty(), 0);
    assert!(!sink.get());

    button.check(ButtonStatus::CURRENT | ButtonStatus::DOWN, 10);
    assert!(sink.get());
    button.check(ButtonStatus::UP, 20);
    assert!(!sink.get());
}

#[test]
fn mirror_sink_into_shared_byte() {
    let byte = Cell::new(0u8);
    let bit2 = crate::io::BitMirror::new(&byte, 2);
    let bit5 = crate::io::BitMirror::new(&byte, 5);
    let mut a = Button::bank(0).mirror_to(&bit2);
    let mut b = Button::bank(1).mirror_to(&bit5);
    a.init_state(ButtonStatus::CURRENT, 0);
    b.init_state(ButtonStatus::CURRENT, 0);
    assert_eq!(byte.get(), 0b0010_0100);

    a.check(ButtonStatus::UP, 10);
    assert_eq!(byte.get(), 0b0010_0000);
}

// ═══════════════════════════════════════════════════════════════════════════
// ButtonManager
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn registry_full_is_reported() {
    let mut manager: ButtonManager<'_, 2, 1> = ButtonManager::new(TimingConfig::new());
    let first = manager.register(Button::bank(0)).unwrap();
    let second = manager.register(Button::bank(1)).unwrap();
    assert_eq!(first.index(), 0);
    assert_eq!(second.index(), 1);
    assert_eq!(manager.register(Button::bank(2)), Err(Error::RegistryFull));
    assert_eq!(manager.len(), 2);
    assert_eq!(manager.capacity(), 2);
    assert_eq!(manager.get(second).and_then(|b| b.id()), Some(second));
}

#[test]
fn repeat_fires_after_delay_then_every_interval() {
    let rec = Recorder::new();
    let clock = Clock(Cell::new(0));
    let press = |b: ButtonRef| rec.push(b.tag, Ev::Press(clock.0.get()));

    let mut manager: ButtonManager<'_, 4, 1> = ButtonManager::new(repeat_timing());
    manager
        .register(Button::bank(0).repeat(true).on_press(&press))
        .unwrap();
    manager.init_buttons(&[0], &[], 0);

    for t in (0..=650).step_by(10) {
        clock.0.set(t);
        manager.check_buttons(&[0x01], &[], t);
    }

    assert_eq!(
        rec.events(),
        vec![
            Ev::Press(0),
            Ev::Press(300),
            Ev::Press(400),
            Ev::Press(500),
            Ev::Press(600),
        ]
    );
}

#[test]
fn repeat_keeps_cadence_with_uneven_polling() {
    let rec = Recorder::new();
    let press = |b: ButtonRef| rec.push(b.tag, Ev::Press(b.held_ms));

    let mut manager: ButtonManager<'_, 4, 1> = ButtonManager::new(repeat_timing());
    manager
        .register(Button::bank(0).repeat(true).on_press(&press))
        .unwrap();
    manager.init_buttons(&[0], &[], 0);

    // 7 ms does not divide the 100 ms interval.
    for t in (0..=1_400).step_by(7) {
        manager.check_buttons(&[0x01], &[], t);
    }

    let held: Vec<Millis> = rec
        .events()
        .into_iter()
        .map(|ev| match ev {
            Ev::Press(ms) => ms,
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert_eq!(held.len(), 13);
    assert_eq!(held[0], 0);
    for (n, &ms) in held.iter().skip(1).enumerate() {
        let scheduled = 300 + 100 * n as Millis;
        assert!(
            (scheduled..scheduled + 7).contains(&ms),
            "repeat {n} at {ms} ms, scheduled {scheduled} ms"
        );
    }
}

#[test]
fn zero_repeat_interval_disables_repeat() {
    let rec = Recorder::new();
    let press = |b: ButtonRef| rec.push(b.tag, Ev::Press(b.held_ms));

    let mut manager: ButtonManager<'_, 4, 1> =
        ButtonManager::new(repeat_timing().repeat_interval(0));
    manager
        .register(Button::bank(0).repeat(true).on_press(&press))
        .unwrap();
    manager.init_buttons(&[0], &[], 0);

    for t in (0..=2_000).step_by(10) {
        manager.check_buttons(&[0x01], &[], t);
    }
    assert_eq!(rec.presses(), 1);
}

#[test]
fn long_press_fires_once_per_hold() {
    let rec = Recorder::new();
    let press = |b: ButtonRef| rec.push(b.tag, Ev::Press(b.held_ms));
    let release = |b: ButtonRef| rec.push(b.tag, Ev::Release(b.held_ms));
    let long = |b: ButtonRef| rec.push(b.tag, Ev::Long(b.held_ms));

    let timing = TimingConfig::new().debounce(0).repeat_delay(0).long_press(1_000);
    let mut manager: ButtonManager<'_, 4, 1> = ButtonManager::new(timing);
    manager
        .register(
            Button::bank(0)
                .on_press(&press)
                .on_release(&release)
                .on_long_press(&long),
        )
        .unwrap();
    manager.init_buttons(&[0], &[], 0);
    rec.clear();

    for t in (0..1_500).step_by(10) {
        manager.check_buttons(&[0x01], &[], t);
    }
    manager.check_buttons(&[0x00], &[], 1_500);

    assert_eq!(
        rec.events(),
        vec![
            Ev::Press(0),
            Ev::Long(1_000),
            Ev::Press(1_000),
            Ev::Release(1_500),
        ]
    );

    // A second hold gets its own long press.
    rec.clear();
    for t in (2_000..=3_000).step_by(10) {
        manager.check_buttons(&[0x01], &[], t);
    }
    assert_eq!(rec.count(|ev| matches!(ev, Ev::Long(_))), 1);
}

#[test]
fn holder_debounce_rejects_bounce() {
    let rec = Recorder::new();
    let clock = Clock(Cell::new(0));
    let press = |b: ButtonRef| rec.push(b.tag, Ev::Press(clock.0.get()));
    let release = |b: ButtonRef| rec.push(b.tag, Ev::Release(clock.0.get()));

    let mut manager: ButtonManager<'_, 4, 1> = ButtonManager::new(TimingConfig::new());
    manager
        .register(Button::bank(0).on_press(&press).on_release(&release))
        .unwrap();
    manager.init_buttons(&[0], &[], 0);
    rec.clear();

    // Bounces at 0 and 5, then steady from 10.
    for t in (0..=100).step_by(5) {
        let raw = if t == 5 { 0x00 } else { 0x01 };
        clock.0.set(t);
        manager.check_buttons(&[raw], &[], t);
    }
    assert_eq!(rec.events(), vec![Ev::Press(30)]);
    assert!(manager.is_active(0));
}

#[test]
fn press_and_release_alternate() {
    let rec = Recorder::new();
    let press = |b: ButtonRef| rec.push(b.tag, Ev::Press(0));
    let release = |b: ButtonRef| rec.push(b.tag, Ev::Release(0));

    let timing = TimingConfig::new().debounce(0).repeat_delay(0).long_press(0);
    let mut manager: ButtonManager<'_, 4, 1> = ButtonManager::new(timing);
    manager
        .register(Button::bank(1).on_press(&press).on_release(&release))
        .unwrap();
    manager.init_buttons(&[0], &[], 0);
    rec.clear();

    // Toggle every tick: each commit is exactly one edge.
    for t in 1..=20u32 {
        let raw = if t % 2 == 1 { 0x02 } else { 0x00 };
        manager.check_buttons(&[raw], &[], t);
    }
    let events = rec.events();
    assert_eq!(events.len(), 20);
    for pair in events.chunks(2) {
        assert!(matches!(pair, [Ev::Press(_), Ev::Release(_)]));
    }
}

#[test]
fn active_low_bank_normalizes_polarity() {
    let rec = Recorder::new();
    let press = |b: ButtonRef| rec.push(b.tag, Ev::Press(0));

    let timing = TimingConfig::new().debounce(0);
    let mut manager: ButtonManager<'_, 4, 1> = ButtonManager::new(timing).active_low(true);
    manager.register(Button::bank(0).on_press(&press)).unwrap();
    manager.init_buttons(&[0xFF], &[], 0);
    assert_eq!(manager.current(0), 0);
    assert_eq!(rec.presses(), 0);

    manager.check_buttons(&[0xFE], &[], 1);
    assert_eq!(manager.current(0), 0x01);
    assert!(manager.is_active(0));
    assert_eq!(rec.presses(), 1);
}

#[test]
fn per_bit_polarity_mask() {
    let timing = TimingConfig::new().debounce(0);
    let mut manager: ButtonManager<'_, 4, 1> = ButtonManager::new(timing).polarity([0x0F]);
    manager.init_buttons(&[0x0F], &[], 0);
    assert_eq!(manager.current(0), 0x00);
    manager.check_buttons(&[0xF0], &[], 1);
    assert_eq!(manager.current(0), 0xFF);
}

#[test]
fn second_bank_and_missing_bytes() {
    let rec = Recorder::new();
    let press = |b: ButtonRef| rec.push(b.tag, Ev::Press(0));

    let timing = TimingConfig::new().debounce(0);
    let mut manager: ButtonManager<'_, 4, 2> = ButtonManager::new(timing);
    let pin = bank_index(1, 3) as u8;
    manager.register(Button::bank(pin).on_press(&press)).unwrap();
    manager.init_buttons(&[0, 0], &[], 0);

    manager.check_buttons(&[0x00, 0x08], &[], 1);
    assert_eq!(rec.log.borrow().as_slice(), &[(11, Ev::Press(0))]);

    // Short vector: bank 1 keeps its state.
    manager.check_buttons(&[0x00], &[], 2);
    assert!(manager.is_active(11));
    assert_eq!(manager.current(5), 0);
}

#[test]
fn out_of_range_pin_is_ignored() {
    let rec = Recorder::new();
    let press = |b: ButtonRef| rec.push(b.tag, Ev::Press(0));
    let release = |b: ButtonRef| rec.push(b.tag, Ev::Release(0));

    let timing = TimingConfig::new().debounce(0);
    let mut manager: ButtonManager<'_, 4, 1> = ButtonManager::new(timing);
    let id = manager
        .register(Button::bank(9).on_press(&press).on_release(&release))
        .unwrap();
    manager.init_buttons(&[0xFF], &[], 0);
    for t in 1..50 {
        manager.check_buttons(&[0xFF], &[], t);
    }
    assert!(rec.events().is_empty());
    assert!(!manager.get(id).unwrap().is_initialized());
}

#[test]
fn late_registration_gets_init_state() {
    let rec = Recorder::new();
    let press = |b: ButtonRef| rec.push(b.tag, Ev::Press(0));

    let timing = TimingConfig::new().debounce(0);
    let mut manager: ButtonManager<'_, 4, 1> = ButtonManager::new(timing);
    manager.init_buttons(&[0x04], &[], 0);
    manager.register(Button::bank(2).on_press(&press)).unwrap();
    assert_eq!(rec.presses(), 0);

    manager.check_buttons(&[0x04], &[], 10);
    manager.check_buttons(&[0x04], &[], 20);
    assert_eq!(rec.presses(), 1);
}

#[test]
fn round_robin_cursor_wraps() {
    let mut manager: ButtonManager<'_, 4, 1> = ButtonManager::new(TimingConfig::new());
    assert!(manager.next().is_none());
    for pin in 0..3 {
        manager.register(Button::bank(pin)).unwrap();
    }
    let tags: Vec<u16> = (0..5)
        .filter_map(|_| manager.next().map(|b| b.tag_value()))
        .collect();
    assert_eq!(tags, vec![0, 1, 2, 0, 1]);
}

// ═══════════════════════════════════════════════════════════════════════════
// Self-sampled sources
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn pin_button_debounces_and_long_presses() {
    let rec = Recorder::new();
    let press = |b: ButtonRef| rec.push(b.tag, Ev::Press(b.held_ms));
    let release = |b: ButtonRef| rec.push(b.tag, Ev::Release(b.held_ms));
    let long = |b: ButtonRef| rec.push(b.tag, Ev::Long(b.held_ms));

    let level = Cell::new(true);
    let mut pin = MockPin { level: &level };
    let timing = TimingConfig::new().debounce(20).repeat_delay(0).long_press(500);

    let mut manager: ButtonManager<'_, 4, 1> = ButtonManager::new(TimingConfig::new());
    manager
        .register(
            Button::pin(&mut pin)
                .tag(42)
                .active_low(true)
                .timing(timing)
                .on_press(&press)
                .on_release(&release)
                .on_long_press(&long),
        )
        .unwrap();
    manager.init_buttons(&[], &[], 0);
    assert_eq!(rec.events(), vec![Ev::Release(0)]);
    rec.clear();

    for t in (5..=1_000).step_by(5) {
        level.set(!(100..800).contains(&t));
        manager.check_buttons(&[], &[], t);
    }

    assert_eq!(
        rec.events(),
        vec![
            Ev::Press(0),
            Ev::Long(500),
            Ev::Press(500),
            Ev::Release(700),
        ]
    );
    assert!(rec.log.borrow().iter().all(|&(tag, _)| tag == 42));
}

#[test]
fn failed_pin_read_counts_as_inactive() {
    let rec = Recorder::new();
    let press = |b: ButtonRef| rec.push(b.tag, Ev::Press(0));

    let mut pin = DeadPin;
    let mut button = Button::pin(&mut pin)
        .timing(TimingConfig::new().debounce(0))
        .on_press(&press);
    for t in 0..20 {
        button.poll(&[], t);
    }
    assert!(button.is_initialized());
    assert!(!button.is_pressed());
    assert_eq!(rec.presses(), 0);
}

#[test]
fn mirror_source_button() {
    let rec = Recorder::new();
    let press = |b: ButtonRef| rec.push(b.tag, Ev::Press(0));
    let release = |b: ButtonRef| rec.push(b.tag, Ev::Release(0));

    let source = Cell::new(false);
    let mut button = Button::mirror(&source)
        .timing(TimingConfig::new().debounce(0))
        .on_press(&press)
        .on_release(&release);
    button.poll(&[], 0);
    source.set(true);
    button.poll(&[], 1);
    source.set(false);
    button.poll(&[], 2);

    assert_eq!(rec.events(), vec![Ev::Release(0), Ev::Press(0), Ev::Release(0)]);
}

#[test]
fn analog_button_uses_hysteresis() {
    let mut button = Button::analog(0, 100, 150)
        .hysteresis(10)
        .timing(TimingConfig::new().debounce(0));

    let mut pressed_at = |value: u8, t: Millis| {
        button.poll(&[value], t);
        button.is_pressed()
    };
    assert!(!pressed_at(50, 0));
    assert!(pressed_at(120, 1));
    assert!(pressed_at(155, 2));
    assert!(pressed_at(95, 3));
    assert!(!pressed_at(165, 4));
    assert!(!pressed_at(155, 5));
    assert!(pressed_at(150, 6));
}

#[test]
fn analog_button_with_equal_thresholds_never_activates() {
    let rec = Recorder::new();
    let press = |b: ButtonRef| rec.push(b.tag, Ev::Press(0));

    let mut button = Button::analog(0, 100, 100)
        .timing(TimingConfig::new().debounce(0))
        .on_press(&press);
    for (t, value) in (0..=255u8).enumerate() {
        button.poll(&[value], t as Millis);
    }
    assert_eq!(rec.presses(), 0);
    assert!(!analog_level(100, 100, 100, 0, false));
    assert!(!analog_level(100, 200, 100, 5, true));
}

#[test]
fn analog_button_ignores_missing_channel() {
    let mut button = Button::analog(3, 10, 20);
    button.poll(&[15, 15], 0);
    assert!(!button.is_initialized());
    button.poll(&[15, 15, 15, 15], 1);
    assert!(button.is_initialized());
    assert!(button.is_pressed());
}

#[test]
fn analog_level_band_edges() {
    assert!(analog_level(10, 10, 20, 0, false));
    assert!(analog_level(20, 10, 20, 0, false));
    assert!(!analog_level(21, 10, 20, 0, false));
    assert!(analog_level(0, 5, 20, 10, true));
    assert!(analog_level(255, 10, 250, 10, true));
}

#[test]
fn snapshot_carries_identity() {
    let mut manager: ButtonManager<'_, 4, 1> = ButtonManager::new(TimingConfig::new());
    let id = manager.register(Button::bank(5).tag(500)).unwrap();
    let snap = manager.get(id).unwrap().snapshot(0);
    assert_eq!(snap.id, Some(id));
    assert_eq!(snap.tag, 500);
    assert_eq!(snap.pin, Some(5));
    assert!(!snap.pressed);

    let source = Cell::new(false);
    let mirror = Button::mirror(&source);
    assert_eq!(mirror.snapshot(0).pin, None);
}

#[test]
fn blanker_policy_reacts_on_first_edge() {
    let rec = Recorder::new();
    let clock = Clock(Cell::new(0));
    let press = |b: ButtonRef| rec.push(b.tag, Ev::Press(clock.0.get()));
    let release = |b: ButtonRef| rec.push(b.tag, Ev::Release(clock.0.get()));

    let timing = TimingConfig::new().debounce(20).repeat_delay(0).long_press(0);
    let mut manager: ButtonManager<'_, 4, 1> =
        ButtonManager::new(timing).policy(crate::debounce::Policy::Blanker);
    manager
        .register(Button::bank(0).on_press(&press).on_release(&release))
        .unwrap();
    manager.init_buttons(&[0], &[], 0);
    rec.clear();

    for (t, raw) in [(10, 1), (15, 0), (20, 1), (25, 0), (40, 1), (60, 1)] {
        clock.0.set(t);
        manager.check_buttons(&[raw], &[], t);
    }
    assert_eq!(rec.events(), vec![Ev::Press(10)]);
}
