use crate::error::{Error, Result};
use crate::slots::ToolType;
use crate::transform::Point;
use crossbeam::channel::{Receiver, RecvTimeoutError};
use log::debug;
use std::fmt;
use std::time::Duration;

pub const EPSILON: f32 = 0.001;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Input source bits as the OS reports them.
pub mod source {
    pub const KEYBOARD: u32 = 0x0000_0101;
    pub const MOUSE: u32 = 0x0000_2002;
    pub const TOUCHSCREEN: u32 = 0x0000_1002;
    pub const STYLUS: u32 = 0x0000_4002;
}

/// Pointer button state bits.
pub mod button {
    pub const PRIMARY: u32 = 1 << 0;
    pub const SECONDARY: u32 = 1 << 1;
    pub const TERTIARY: u32 = 1 << 2;
    pub const STYLUS_PRIMARY: u32 = 1 << 5;
    pub const STYLUS_SECONDARY: u32 = 1 << 6;
}

pub const FLAG_CANCELED: u32 = 0x20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionAction {
    Down,
    Move,
    Up,
    PointerDown { index: usize },
    PointerUp { index: usize },
    Cancel,
    ButtonPress,
    ButtonRelease,
    HoverEnter,
    HoverMove,
    HoverExit,
}

impl fmt::Display for MotionAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MotionAction::PointerDown { index } => write!(f, "POINTER_DOWN({})", index),
            MotionAction::PointerUp { index } => write!(f, "POINTER_UP({})", index),
            other => write!(f, "{:?}", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Down,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pointer {
    pub id: i32,
    pub tool_type: ToolType,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MotionEvent {
    pub action: MotionAction,
    pub pointers: Vec<Pointer>,
    pub button_state: u32,
    pub action_button: u32,
    pub flags: u32,
    pub device_id: i32,
    pub source: u32,
    pub event_time: Duration,
}

impl MotionEvent {
    /// The pointer the action refers to.
    pub fn action_pointer(&self) -> Option<&Pointer> {
        match self.action {
            MotionAction::PointerDown { index } | MotionAction::PointerUp { index } => {
                self.pointers.get(index)
            }
            _ => self.pointers.first(),
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.flags & FLAG_CANCELED != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub action: KeyAction,
    pub key_code: i32,
    pub scan_code: i32,
    pub device_id: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObservedEvent {
    Motion(MotionEvent),
    Key(KeyEvent),
}

/// What an observed motion event has to look like. Unset fields are not
/// checked.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpectedMotion {
    pub action: MotionAction,
    pub tool_type: Option<ToolType>,
    pub position: Option<Point>,
    pub button_state: Option<u32>,
    pub action_button: Option<u32>,
    pub device_id: Option<i32>,
    pub source: Option<u32>,
    pub canceled: Option<bool>,
}

impl ExpectedMotion {
    pub fn new(action: MotionAction) -> ExpectedMotion {
        ExpectedMotion {
            action,
            tool_type: None,
            position: None,
            button_state: None,
            action_button: None,
            device_id: None,
            source: None,
            canceled: None,
        }
    }

    pub fn tool_type(mut self, tool_type: ToolType) -> Self {
        self.tool_type = Some(tool_type);
        self
    }

    pub fn at(mut self, point: Point) -> Self {
        self.position = Some(point);
        self
    }

    pub fn buttons(mut self, button_state: u32) -> Self {
        self.button_state = Some(button_state);
        self
    }

    pub fn action_button(mut self, action_button: u32) -> Self {
        self.action_button = Some(action_button);
        self
    }

    pub fn device(mut self, device_id: i32) -> Self {
        self.device_id = Some(device_id);
        self
    }

    pub fn source(mut self, source: u32) -> Self {
        self.source = Some(source);
        self
    }

    pub fn canceled(mut self, canceled: bool) -> Self {
        self.canceled = Some(canceled);
        self
    }

    pub fn check(&self, event: &MotionEvent) -> Result<()> {
        if event.action != self.action {
            return Err(Error::mismatch("action", self.action, event.action));
        }
        let pointer = event
            .action_pointer()
            .ok_or_else(|| Error::mismatch("pointer count", "at least one", event.pointers.len()))?;
        if let Some(tool_type) = self.tool_type {
            if pointer.tool_type != tool_type {
                return Err(Error::mismatch("tool type", tool_type, pointer.tool_type));
            }
        }
        if let Some(position) = self.position {
            let actual = Point::new(pointer.x, pointer.y);
            if !position.approx_eq(&actual, EPSILON) {
                return Err(Error::mismatch("position", position, actual));
            }
        }
        check_field("button state", self.button_state, event.button_state)?;
        check_field("action button", self.action_button, event.action_button)?;
        check_field("device id", self.device_id, event.device_id)?;
        check_field("source", self.source, event.source)?;
        check_field("canceled flag", self.canceled, event.is_canceled())?;
        Ok(())
    }
}

fn check_field<T: PartialEq + fmt::Debug>(
    what: &'static str,
    expected: Option<T>,
    actual: T,
) -> Result<()> {
    match expected {
        Some(expected) if expected != actual => Err(Error::mismatch(what, expected, actual)),
        _ => Ok(()),
    }
}

/// Reads the events the OS dispatched to the test window, in order.
pub struct EventVerifier {
    receiver: Receiver<ObservedEvent>,
    timeout: Duration,
}

impl EventVerifier {
    pub fn new(receiver: Receiver<ObservedEvent>) -> EventVerifier {
        EventVerifier::with_timeout(receiver, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(receiver: Receiver<ObservedEvent>, timeout: Duration) -> EventVerifier {
        EventVerifier { receiver, timeout }
    }

    pub fn next_event(&self) -> Result<ObservedEvent> {
        match self.receiver.recv_timeout(self.timeout) {
            Ok(event) => {
                debug!("observed {:?}", event);
                Ok(event)
            }
            Err(RecvTimeoutError::Timeout) => Err(Error::NoEvent(self.timeout)),
            Err(RecvTimeoutError::Disconnected) => {
                Err(Error::Transport("event queue disconnected".to_string()))
            }
        }
    }

    pub fn next_motion(&self) -> Result<MotionEvent> {
        match self.next_event()? {
            ObservedEvent::Motion(event) => Ok(event),
            other => Err(Error::UnexpectedEvent(Box::new(other))),
        }
    }

    pub fn next_key(&self) -> Result<KeyEvent> {
        match self.next_event()? {
            ObservedEvent::Key(event) => Ok(event),
            other => Err(Error::UnexpectedEvent(Box::new(other))),
        }
    }

    pub fn assert_motion(&self, expected: &ExpectedMotion) -> Result<MotionEvent> {
        let event = self.next_motion()?;
        expected.check(&event)?;
        Ok(event)
    }

    pub fn assert_key(&self, action: KeyAction, key_code: i32) -> Result<KeyEvent> {
        let event = self.next_key()?;
        if event.action != action {
            return Err(Error::mismatch("key action", action, event.action));
        }
        if event.key_code != key_code {
            return Err(Error::mismatch("key code", key_code, event.key_code));
        }
        Ok(event)
    }

    /// Fails if anything arrives within `wait`.
    pub fn assert_no_more_events(&self, wait: Duration) -> Result<()> {
        match self.receiver.recv_timeout(wait) {
            Ok(event) => Err(Error::UnexpectedEvent(Box::new(event))),
            Err(_) => Ok(()),
        }
    }
}
