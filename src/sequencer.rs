//! Tone sequencer module
//!
//! Owns the buzzer and plays one melody at a time. Commands arrive through a
//! [`ToneControl`] shared with the router; a new command always supersedes the
//! melody in flight, so at most one playback session exists.

use crate::indicator::ActivityLed;
use crate::melody::Melody;
use crate::playback::{PlaybackEvent, PlaybackSession, PlaybackState};
use crate::quantizer::Note;
use crate::{NodeError, config};
use core::cell::Cell;
use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer};
use embedded_hal::digital::OutputPin;
use log::{debug, info, warn};

/// Square-wave tone output
pub trait Buzzer {
    /// Program the output frequency without changing whether it sounds
    fn set_frequency(&mut self, hz: u32) -> Result<(), NodeError>;
    /// Start driving the output at `duty_percent`
    fn enable(&mut self, duty_percent: u8) -> Result<(), NodeError>;
    /// Stop driving the output
    fn disable(&mut self) -> Result<(), NodeError>;
}

/// Commands accepted by the sequencer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToneCommand {
    /// Replace whatever is playing with this melody
    Play(Melody),
    /// Cancel playback and silence the buzzer
    Stop,
}

/// Command mailbox plus published playback state.
///
/// The mailbox holds only the latest command; only the sequencer writes the
/// state.
pub struct ToneControl {
    commands: Signal<CriticalSectionRawMutex, ToneCommand>,
    state: Mutex<CriticalSectionRawMutex, Cell<PlaybackState>>,
}

impl ToneControl {
    pub const fn new() -> Self {
        Self {
            commands: Signal::new(),
            state: Mutex::new(Cell::new(PlaybackState::Idle)),
        }
    }

    pub fn handle(&self) -> SequencerHandle<'_> {
        SequencerHandle { control: self }
    }

    pub fn state(&self) -> PlaybackState {
        self.state.lock(|state| state.get())
    }

    fn publish(&self, new_state: PlaybackState) {
        self.state.lock(|state| state.set(new_state));
    }
}

impl Default for ToneControl {
    fn default() -> Self {
        Self::new()
    }
}

/// What the router holds to drive the sequencer
#[derive(Clone, Copy)]
pub struct SequencerHandle<'a> {
    control: &'a ToneControl,
}

impl SequencerHandle<'_> {
    /// Hand `melody` to the sequencer, superseding any pending command
    pub fn play(&self, melody: Melody) {
        self.control.commands.signal(ToneCommand::Play(melody));
    }

    pub fn stop(&self) {
        self.control.commands.signal(ToneCommand::Stop);
    }

    pub fn state(&self) -> PlaybackState {
        self.control.state()
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.state(), PlaybackState::Playing { .. })
    }

    /// A command was sent but the sequencer has not picked it up yet
    pub fn has_pending(&self) -> bool {
        self.control.commands.signaled()
    }

    /// Whether the buzzer is, or is about to be, in use
    pub fn is_busy(&self) -> bool {
        self.has_pending() || self.state() != PlaybackState::Idle
    }
}

/// Plays melodies on a [`Buzzer`]
pub struct ToneSequencer<'a, B, L>
where
    B: Buzzer,
    L: OutputPin,
{
    buzzer: B,
    led: ActivityLed<L>,
    control: &'a ToneControl,
    session: PlaybackSession,
    note_duration: Duration,
    duty_percent: u8,
}

impl<'a, B, L> ToneSequencer<'a, B, L>
where
    B: Buzzer,
    L: OutputPin,
{
    /// Create a sequencer; the buzzer is forced silent
    pub fn new(buzzer: B, led: L, control: &'a ToneControl) -> Self {
        let mut sequencer = Self {
            buzzer,
            led: ActivityLed::new(led),
            control,
            session: PlaybackSession::new(),
            note_duration: Duration::from_millis(config::NOTE_DURATION_MS),
            duty_percent: config::BUZZER_DUTY_PERCENT,
        };
        sequencer.silence();
        control.publish(PlaybackState::Idle);
        sequencer
    }

    /// Hold time for notes that carry no duration of their own
    pub fn with_note_duration(mut self, note_duration: Duration) -> Self {
        self.note_duration = note_duration;
        self
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn buzzer(&self) -> &B {
        &self.buzzer
    }

    /// Serve commands forever
    pub async fn run(&mut self) -> ! {
        info!(
            "[TONE] Sequencer ready ({} ms per note, {}% duty)",
            self.note_duration.as_millis(),
            self.duty_percent
        );

        loop {
            let command = self.control.commands.wait().await;
            self.execute(command).await;
        }
    }

    /// Carry out `command`, and whatever supersedes it, until the buzzer is idle
    pub async fn execute(&mut self, command: ToneCommand) {
        let mut next = Some(command);
        while let Some(command) = next.take() {
            next = match command {
                ToneCommand::Stop => {
                    self.stop();
                    None
                }
                ToneCommand::Play(melody) => self.play(melody).await,
            };
        }
    }

    /// Play `melody`; returns the command that cut it short, if any
    async fn play(&mut self, melody: Melody) -> Option<ToneCommand> {
        self.transition(PlaybackEvent::Start { len: melody.len() });
        if !self.session.is_playing() {
            self.silence();
            debug!("[TONE] Empty melody, nothing to play");
            return None;
        }

        info!("[TONE] Playing melody of {} notes", melody.len());
        let control = self.control;

        for (position, note) in melody.notes().iter().enumerate() {
            debug!(
                "[TONE] Note {}/{}: {} Hz",
                position + 1,
                melody.len(),
                note.frequency_hz
            );

            if let Err(e) = self.sound(note) {
                warn!("[TONE] Buzzer error on note {}: {:?}", position + 1, e);
                self.silence();
            }

            let hold = note
                .duration_ms
                .map(|ms| Duration::from_millis(ms as u64))
                .unwrap_or(self.note_duration);
            let outcome = select(Timer::after(hold), control.commands.wait()).await;

            // The output is off again before anything else happens
            self.silence();

            match outcome {
                Either::First(()) => self.transition(PlaybackEvent::Advance),
                Either::Second(ToneCommand::Stop) => {
                    self.transition(PlaybackEvent::Cancel);
                    self.stop();
                    return None;
                }
                Either::Second(command) => {
                    self.transition(PlaybackEvent::Cancel);
                    return Some(command);
                }
            }
        }

        None
    }

    /// Cancel any session and force the buzzer silent
    fn stop(&mut self) {
        self.silence();
        self.transition(PlaybackEvent::Cancel);
        self.transition(PlaybackEvent::Settled);
        info!("[TONE] All sounds stopped");
    }

    fn sound(&mut self, note: &Note) -> Result<(), NodeError> {
        if note.is_rest() {
            return self.buzzer.disable();
        }
        self.buzzer.set_frequency(note.frequency_hz)?;
        self.buzzer.enable(self.duty_percent)?;
        self.led.on().ok(); // Silent error handling
        Ok(())
    }

    fn silence(&mut self) {
        if let Err(e) = self.buzzer.disable() {
            warn!("[TONE] Failed to silence buzzer: {:?}", e);
        }
        self.led.off().ok();
    }

    fn transition(&mut self, event: PlaybackEvent) {
        self.session.handle_event(event);
        self.control.publish(self.session.get_current_state());
    }
}
