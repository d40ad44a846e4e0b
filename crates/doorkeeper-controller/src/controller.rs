//! The door controller state machine.
//!
//! [`DoorController::tick`] runs once per tick interval:
//!
//! 1. build an [`InputSnapshot`] from the devices and the gateway link
//! 2. publish the status to the gateway link if it changed or is due
//! 3. apply a pending remote command
//! 4. run the handler of the current state
//! 5. turn a requested timeout into a deadline
//! 6. drive the lock towards the state's lock target
//!
//! The controller never talks to the network for logging or notifications;
//! it only enqueues. The awaited calls are the lock command and a cache
//! lookup, both bounded by their own timeouts.

use crate::{
    access::AccessCheck,
    config::ControllerConfig,
    error::Result,
    gateway::{GatewayLink, GatewayStatus},
    state::{DoorState, InputSnapshot, rising_edges},
};
use chrono::{Datelike, Local, Weekday};
use doorkeeper_core::{AccessResult, CardId, Keys, LockState, RemoteCommand};
use doorkeeper_dispatch::{EventLog, MembershipUpdater, Notifier};
use doorkeeper_hardware::{ButtonPanel, CardSource, Color, DoorLock, StatusDisplay};
use doorkeeper_protocol::{Pattern, Sound};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Weekday the space opens on.
pub const OPEN_DAY: Weekday = Weekday::Thu;

/// Source of the current weekday.
pub type Calendar = Box<dyn Fn() -> Weekday + Send + Sync>;

/// The devices attached to the door.
#[derive(Debug, Clone)]
pub struct Devices<R, L, P, D> {
    pub reader: R,
    pub lock: L,
    pub panel: P,
    pub display: D,
}

/// Producer ends of the outbound dispatchers.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub events: EventLog,
    pub notifier: Notifier,
    pub membership: MembershipUpdater,
}

/// Door controller.
pub struct DoorController<R, L, P, A, D> {
    devices: Devices<R, L, P, D>,
    access: A,
    outbound: Outbound,
    gateway: GatewayLink,
    config: ControllerConfig,
    calendar: Calendar,

    state: DoorState,
    deadline: Option<Instant>,
    pending_timeout: Option<Duration>,

    pattern: Option<Pattern>,
    sound: Sound,
    feedback_until: Option<Instant>,

    lock_retry_at: Option<Instant>,
    lock_failing: bool,

    last_keys: Keys,
    last_sensors: Option<(LockState, bool)>,
    last_push: Option<(GatewayStatus, Instant)>,
}

impl<R, L, P, A, D> DoorController<R, L, P, A, D>
where
    R: CardSource,
    L: DoorLock,
    P: ButtonPanel,
    A: AccessCheck,
    D: StatusDisplay,
{
    pub fn new(
        devices: Devices<R, L, P, D>,
        access: A,
        outbound: Outbound,
        gateway: GatewayLink,
        config: ControllerConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            devices,
            access,
            outbound,
            gateway,
            config,
            calendar: Box::new(|| Local::now().weekday()),
            state: DoorState::Initial,
            deadline: None,
            pending_timeout: None,
            pattern: None,
            sound: Sound::None,
            feedback_until: None,
            lock_retry_at: None,
            lock_failing: false,
            last_keys: Keys::default(),
            last_sensors: None,
            last_push: None,
        })
    }

    /// Replace the weekday source.
    pub fn with_calendar(mut self, calendar: impl Fn() -> Weekday + Send + Sync + 'static) -> Self {
        self.calendar = Box::new(calendar);
        self
    }

    pub fn state(&self) -> DoorState {
        self.state
    }

    /// Time until the current timed unlock ends.
    pub fn time_left(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Tick forever at the configured interval.
    pub async fn run(&mut self) {
        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(door = %self.config.door_name, "door controller started");
        loop {
            interval.tick().await;
            self.tick().await;
        }
    }

    /// Run one controller cycle.
    pub async fn tick(&mut self) {
        let now = Instant::now();
        let input = self.snapshot();
        self.log_inputs(&input);
        self.push_status(&input, now);
        if let Some(command) = input.remote.clone() {
            self.apply_remote(command, &input, now);
        }

        let previous = self.state;
        match self.state {
            DoorState::Initial => self.handle_initial(),
            DoorState::Locked => self.handle_locked(&input, now).await,
            DoorState::Open => self.handle_open(&input, now).await,
            DoorState::TimedUnlock => self.handle_timed_unlock(&input, now),
        }
        if self.state != previous {
            info!(from = %previous, to = %self.state, "door state changed");
            self.outbound
                .events
                .log(format!("State {previous} -> {}", self.state));
        }

        if let Some(timeout) = self.pending_timeout.take() {
            self.outbound
                .events
                .log(format!("Set timeout of {} s", timeout.as_secs()));
            self.deadline = Some(now + timeout);
        }

        self.drive_lock(now).await;
    }

    fn snapshot(&mut self) -> InputSnapshot {
        let keys = self.devices.panel.keys();
        let pressed = rising_edges(keys, self.last_keys);
        self.last_keys = keys;
        let status = self.devices.lock.status();

        InputSnapshot {
            keys,
            pressed,
            door_open: status.door_open,
            handle_raised: status.handle_raised,
            lock_state: status.state,
            card: self.devices.reader.take_card_id(),
            remote: self.gateway.take_action(),
            open_day: self.gateway.allow_open() || (self.calendar)() == OPEN_DAY,
        }
    }

    fn log_inputs(&mut self, input: &InputSnapshot) {
        if let Some(card) = input.card {
            self.outbound.events.log(format!("Card {card} swiped"));
        }
        if input.pressed.any() {
            debug!(keys = %input.keys, "buttons pressed");
            self.outbound.events.log(format!("Keys {}", input.keys));
        }
        let sensors = (input.lock_state, input.door_open);
        if self.last_sensors != Some(sensors) {
            self.outbound.events.log(format!(
                "Lock status {} door {}",
                input.lock_state.as_wire(),
                open_closed(input.door_open)
            ));
            self.last_sensors = Some(sensors);
        }
    }

    fn push_status(&mut self, input: &InputSnapshot, now: Instant) {
        let status = GatewayStatus {
            door: open_closed(input.door_open),
            space: open_closed(self.state == DoorState::Open),
            lock_status: input.lock_state.as_wire(),
            log_overflows: self.outbound.events.overflows(),
        };
        let due = match &self.last_push {
            None => true,
            Some((last, at)) => *last != status || now.duration_since(*at) >= self.config.status_push,
        };
        if due {
            self.gateway.set_status(status.clone());
            self.last_push = Some((status, now));
        }
    }

    /// Apply a command received from the gateway.
    ///
    /// A remote lock is refused whenever the door sensor reports open, even if
    /// the lock itself is already closed, so the bolt never throws into the frame.
    fn apply_remote(&mut self, command: RemoteCommand, input: &InputSnapshot, now: Instant) {
        self.outbound.events.log(format!("Start action '{command}'"));
        match command {
            RemoteCommand::Lock => {
                if input.door_open {
                    warn!("remote lock refused, door is open");
                    self.outbound.notifier.send(":stop: Door is open, cannot lock");
                    return;
                }
                self.outbound.notifier.send(":lock: Door locked remotely");
                self.leave_open_state();
                self.deadline = None;
                self.state = DoorState::Locked;
            }
            RemoteCommand::Unlock => {
                self.outbound.notifier.send(":unlock: Door unlocked remotely");
                self.leave_open_state();
                self.state = DoorState::TimedUnlock;
                self.deadline = Some(now + self.config.remote_unlock);
            }
            RemoteCommand::Unknown(action) => {
                self.outbound
                    .events
                    .log(format!("Unknown action '{action}'"));
                self.outbound
                    .notifier
                    .send(&format!(":question: Unknown action '{action}'"));
            }
        }
    }

    fn handle_initial(&mut self) {
        self.set_pattern(Pattern::Ready);
        self.state = DoorState::Locked;
    }

    async fn handle_locked(&mut self, input: &InputSnapshot, now: Instant) {
        self.idle_pattern(Pattern::Ready, now);
        self.set_sound(Sound::None);
        self.devices.display.set_status("Locked", Color::Orange);
        self.outbound
            .notifier
            .set_status(":lock: Door is locked", false);

        if input.pressed.white {
            self.check_open_day(input);
        } else if input.pressed.green {
            self.outbound.events.log("Green pressed");
            self.start_timeout(self.config.unlock_period);
            self.state = DoorState::TimedUnlock;
        } else if let Some(card) = input.card {
            self.check_card(card, true, now).await;
        } else if input.pressed.leave {
            self.outbound
                .notifier
                .send(":exit: The Leave button has been pressed");
            self.start_timeout(self.config.leave_time);
            self.state = DoorState::TimedUnlock;
        }
    }

    async fn handle_open(&mut self, input: &InputSnapshot, now: Instant) {
        self.idle_pattern(Pattern::Open, now);
        self.set_sound(Sound::None);
        self.devices.display.set_status("Open", Color::Green);

        if !input.open_day {
            self.outbound.events.log("It is no longer an open day");
            self.leave_open_state();
            self.state = DoorState::Locked;
        } else if input.keys.red {
            self.leave_open_state();
            self.state = DoorState::Locked;
        }
        // Cards are still evaluated while open.
        if let Some(card) = input.card {
            self.check_card(card, false, now).await;
        }
    }

    fn handle_timed_unlock(&mut self, input: &InputSnapshot, now: Instant) {
        let expired = self.deadline.is_none_or(|deadline| now >= deadline);
        if input.keys.red || expired {
            self.deadline = None;
            self.state = DoorState::Locked;
            return;
        }

        if input.pressed.white {
            self.check_open_day(input);
            if self.state == DoorState::Open {
                self.deadline = None;
                return;
            }
        }
        if input.pressed.leave {
            self.outbound
                .notifier
                .send(":exit: The Leave button has been pressed");
            self.start_timeout(self.config.leave_time);
            self.set_sound(Sound::None);
            return;
        }

        let left = self
            .deadline
            .map_or(Duration::ZERO, |deadline| deadline.saturating_duration_since(now));
        if left <= self.config.unlock_warn {
            self.set_pattern(Pattern::WarnClosing);
            let sound = if left > self.config.closing_warn {
                Sound::WarningBeep
            } else {
                Sound::ClosingWarning
            };
            self.set_sound(sound);
            self.devices
                .display
                .set_status(&countdown(left), Color::Orange);
        } else {
            self.devices.display.set_status("Open", Color::Green);
        }
    }

    fn check_open_day(&mut self, input: &InputSnapshot) {
        if !input.open_day {
            self.devices.display.show_message(
                "It is not Thursday yet",
                Color::Red,
                self.config.message_duration,
            );
            return;
        }
        self.state = DoorState::Open;
        self.outbound.notifier.announce_open();
    }

    fn leave_open_state(&mut self) {
        if self.state == DoorState::Open {
            self.outbound.notifier.announce_closed();
        }
    }

    async fn check_card(&mut self, card: CardId, change_state: bool, now: Instant) {
        let result = self.access.has_access(card).await;
        debug!(card_id = %card, %result, "card evaluated");
        let shown_for = self.config.message_duration;

        match result {
            AccessResult::Allowed(user) => {
                if change_state {
                    self.devices
                        .display
                        .show_message("Valid card swiped", Color::Green, shown_for);
                    self.set_pattern(Pattern::Enter);
                    self.outbound
                        .notifier
                        .send(":key: Valid card swiped, unlocking");
                    self.start_timeout(self.config.enter_time);
                    self.state = DoorState::TimedUnlock;
                } else {
                    self.outbound
                        .notifier
                        .send(":key: Valid card swiped while open");
                }
                self.outbound.membership.record_access(user);
                self.outbound
                    .events
                    .audit(user, format!("{}: Granted entry", self.config.door_name));
            }
            AccessResult::Forbidden => {
                self.devices.display.show_message(
                    &format!("Blocked card {card} swiped"),
                    Color::Orange,
                    shown_for,
                );
                self.feedback(Pattern::NoEntry, now);
                self.outbound
                    .notifier
                    .send(":bandit: Unauthorized card swiped");
                self.outbound
                    .events
                    .log(format!("Unauthorized card {card} swiped"));
            }
            AccessResult::UnknownCard => {
                self.devices.display.show_message(
                    &format!("Unknown card\n{card}\nswiped"),
                    Color::Orange,
                    shown_for,
                );
                self.feedback(Pattern::NoEntry, now);
                self.outbound
                    .notifier
                    .send(&format!(":broken_key: Unknown card {card} swiped"));
                self.outbound.events.unknown_card(card);
            }
            AccessResult::Error(message) => {
                self.devices
                    .display
                    .show_message("Error checking card", Color::Red, shown_for);
                self.feedback(Pattern::Error, now);
                self.outbound.notifier.send(&format!(
                    ":computer_rage: Internal error checking card: {message}"
                ));
            }
        }
    }

    async fn drive_lock(&mut self, now: Instant) {
        let target = self.state.lock_target();
        if self.devices.lock.status().state == target {
            return;
        }
        if self.lock_retry_at.is_some_and(|at| now < at) {
            return;
        }

        match self.devices.lock.set_state(target).await {
            Ok(()) => {
                self.lock_retry_at = None;
                if self.lock_failing {
                    info!(state = %target, "lock responding again");
                    self.lock_failing = false;
                }
            }
            Err(e) => {
                warn!(state = %target, error = %e, "lock command failed");
                self.outbound
                    .events
                    .log(format!("Lock command failed: {e}"));
                self.lock_retry_at = Some(now + self.config.lock_retry);
                if !self.lock_failing {
                    self.lock_failing = true;
                    self.outbound
                        .notifier
                        .send(&format!(":warning: Lock command failed: {e}"));
                }
            }
        }
    }

    fn start_timeout(&mut self, timeout: Duration) {
        self.pending_timeout = Some(timeout);
    }

    fn set_pattern(&mut self, pattern: Pattern) {
        if self.pattern != Some(pattern) {
            self.devices.reader.set_pattern(pattern);
            self.pattern = Some(pattern);
        }
    }

    /// Show `pattern` unless card feedback is still on display.
    fn idle_pattern(&mut self, pattern: Pattern, now: Instant) {
        if self.feedback_until.is_some_and(|until| now < until) {
            return;
        }
        self.feedback_until = None;
        self.set_pattern(pattern);
    }

    fn feedback(&mut self, pattern: Pattern, now: Instant) {
        self.set_pattern(pattern);
        self.feedback_until = Some(now + self.config.message_duration);
    }

    fn set_sound(&mut self, sound: Sound) {
        if self.sound != sound {
            self.devices.reader.set_sound(sound);
            self.sound = sound;
        }
    }
}

fn open_closed(open: bool) -> &'static str {
    if open { "open" } else { "closed" }
}

/// Display text for the remaining time of a timed unlock.
fn countdown(left: Duration) -> String {
    let secs = left.as_secs();
    let mins = secs.div_ceil(60);
    if mins > 1 {
        format!("Open for\n{mins} minutes")
    } else {
        format!("Open for\n{secs} seconds")
    }
}
