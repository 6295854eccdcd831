//! Demo control-panel firmware for the nRF52840.
//!
//! Wiring (all inputs active-low with internal pull-up):
//!   - P0_11, P0_12, P0_25 - bank keys 0..=2 (scanned by the ButtonManager)
//!   - P0_24               - SELECT, sampled by its own button
//!   - P0_03 / P0_04       - encoder A / B
//!   - P0_28               - encoder push switch
//!
//! A 1 ms ticker drives the encoder decoder every tick and the button
//! scan every `BUTTON_POLL_DIVIDER` ticks. Callbacks push `PanelEvent`s
//! into a channel; a separate task logs them over RTT.

#![no_std]
#![no_main]

use defmt::{info, warn};
use embassy_executor::Spawner;
use embassy_nrf::gpio::{Input, Pull};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Instant, Ticker};
use {defmt_rtt as _, panic_probe as _};

use panel_input::config::{BUTTON_POLL_DIVIDER, EVENT_QUEUE_DEPTH, POLL_PERIOD_MS};
use panel_input::{
    Button, ButtonManager, ButtonRef, EncoderDecoder, EncoderManager, EncoderRef, Feed,
    ManagedEncoder, Millis, TimingConfig,
};

/// Tag of the SELECT button.
const SELECT_TAG: u16 = 0x100;
/// Tag of the volume encoder.
const VOLUME_TAG: u16 = 0x200;
/// Modes cycled by the encoder push switch.
const VOLUME_MODES: u8 = 3;

/// Events produced by the poll loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, defmt::Format)]
enum PanelEvent {
    Press { tag: u16, held_ms: Millis },
    Release { tag: u16, held_ms: Millis },
    Long { tag: u16 },
    Turn { tag: u16, count: i32, delta: i32 },
    Mode { tag: u16, mode: u8 },
}

static EVENTS: Channel<CriticalSectionRawMutex, PanelEvent, EVENT_QUEUE_DEPTH> = Channel::new();

fn emit(event: PanelEvent) {
    if EVENTS.try_send(event).is_err() {
        warn!("event queue full, dropped {}", event);
    }
}

#[embassy_executor::task]
async fn event_logger() {
    loop {
        let event = EVENTS.receive().await;
        info!("Panel: {}", event);
    }
}

fn now_ms() -> Millis {
    // Truncation wraps after ~49 days; the engine is wraparound-safe.
    Instant::now().as_millis() as Millis
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("panel-input starting");
    let p = embassy_nrf::init(Default::default());

    let keys = [
        Input::new(p.P0_11, Pull::Up),
        Input::new(p.P0_12, Pull::Up),
        Input::new(p.P0_25, Pull::Up),
    ];
    let mut select = Input::new(p.P0_24, Pull::Up);
    let enc_a = Input::new(p.P0_03, Pull::Up);
    let enc_b = Input::new(p.P0_04, Pull::Up);
    let enc_sw = Input::new(p.P0_28, Pull::Up);

    spawner.must_spawn(event_logger());

    // Callbacks
    let on_press = |b: ButtonRef| {
        emit(PanelEvent::Press {
            tag: b.tag,
            held_ms: b.held_ms,
        })
    };
    let on_release = |b: ButtonRef| {
        emit(PanelEvent::Release {
            tag: b.tag,
            held_ms: b.held_ms,
        })
    };
    let on_long = |b: ButtonRef| emit(PanelEvent::Long { tag: b.tag });
    let on_turn = |e: EncoderRef| {
        emit(PanelEvent::Turn {
            tag: e.tag,
            count: e.count,
            delta: e.delta,
        })
    };
    let on_mode = |e: EncoderRef| {
        emit(PanelEvent::Mode {
            tag: e.tag,
            mode: e.mode,
        })
    };

    // Buttons
    let timing = TimingConfig::new();
    let mut buttons: ButtonManager<'_, 8, 1> = ButtonManager::new(timing).active_low(true);
    for pin in 0..keys.len() as u8 {
        let button = Button::bank(pin)
            .repeat(pin < 2)
            .on_press(&on_press)
            .on_release(&on_release)
            .on_long_press(&on_long);
        if let Err(e) = buttons.register(button) {
            warn!("key {}: {}", pin, e);
        }
    }
    let select_button = Button::pin(&mut select)
        .tag(SELECT_TAG)
        .active_low(true)
        .timing(timing.repeat_delay(0))
        .on_press(&on_press)
        .on_release(&on_release)
        .on_long_press(&on_long);
    if let Err(e) = buttons.register(select_button) {
        warn!("select: {}", e);
    }

    // Encoder
    let mut decoder = EncoderDecoder::new(1);
    decoder.set_modes(0, VOLUME_MODES);
    let mut encoders: EncoderManager<'_, 1> = EncoderManager::new();
    let volume = ManagedEncoder::new(0)
        .tag(VOLUME_TAG)
        .feed(Feed::Counts)
        .on_change(&on_turn)
        .on_mode_change(&on_mode);
    if let Err(e) = encoders.register(volume) {
        warn!("volume encoder: {}", e);
    }

    let read_bank = || {
        keys.iter()
            .enumerate()
            .fold(0u8, |bank, (bit, key)| bank | (u8::from(key.is_high()) << bit))
    };
    let read_encoder = || {
        u32::from(enc_a.is_high()) | u32::from(enc_b.is_high()) << 1 | u32::from(enc_sw.is_high()) << 2
    };

    buttons.init_buttons(&[read_bank()], &[], now_ms());
    decoder.update(read_encoder(), now_ms());
    info!("{} buttons, {} encoders ready", buttons.len(), encoders.len());

    let mut ticker = Ticker::every(Duration::from_millis(POLL_PERIOD_MS));
    let mut tick: u32 = 0;
    loop {
        ticker.next().await;
        let now = now_ms();

        decoder.update(read_encoder(), now);
        encoders.dispatch(&mut decoder);

        tick = tick.wrapping_add(1);
        if tick % BUTTON_POLL_DIVIDER == 0 {
            buttons.check_buttons(&[read_bank()], &[], now);
        }
    }
}
