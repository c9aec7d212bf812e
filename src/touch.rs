use crate::descriptor::CapabilityDescriptor;
use crate::error::Result;
use crate::evdev::*;
use crate::injector::{EventInjector, EventSink};
use crate::slots::{SlotTracker, ToolType, Transition};
use crate::verifier::{button, ExpectedMotion, MotionAction};

/// The `MotionEvent` button a stylus key shows up as.
pub fn stylus_button(code: u16) -> Option<u32> {
    match code {
        BTN_STYLUS => Some(button::STYLUS_PRIMARY),
        BTN_STYLUS2 => Some(button::STYLUS_SECONDARY),
        _ => None,
    }
}

pub fn tool_key(tool_type: ToolType) -> Option<u16> {
    match tool_type {
        ToolType::Finger => Some(BTN_TOOL_FINGER),
        ToolType::Pen => Some(BTN_TOOL_PEN),
        ToolType::Palm => None,
    }
}

/// Drives a multi-touch touchscreen or stylus device.
///
/// Every gesture step is sent as one batch and returns the motion event the
/// OS is expected to dispatch for it, or `None` when nothing is dispatched
/// (palms, and lifting a contact that was already cancelled).
pub struct TouchScreen<S: EventSink> {
    injector: EventInjector<S>,
    tracker: SlotTracker,
    next_tracking_id: i32,
    pressed_tool_key: Option<u16>,
    button_state: u32,
}

impl<S: EventSink> TouchScreen<S> {
    pub fn new(descriptor: CapabilityDescriptor, sink: S) -> TouchScreen<S> {
        let tracker = SlotTracker::new(descriptor.slot_capacity());
        TouchScreen {
            injector: EventInjector::new(descriptor, sink),
            tracker,
            next_tracking_id: 0,
            pressed_tool_key: None,
            button_state: 0,
        }
    }

    pub fn tracker(&self) -> &SlotTracker {
        &self.tracker
    }

    pub fn sink(&self) -> &S {
        self.injector.sink()
    }

    pub fn sink_mut(&mut self) -> &mut S {
        self.injector.sink_mut()
    }

    pub fn into_sink(self) -> S {
        self.injector.into_sink()
    }

    fn descriptor(&self) -> &CapabilityDescriptor {
        self.injector.descriptor()
    }

    /// Monotonic, wraps at the declared maximum and skips ids still in use.
    /// Only advances once a down has been sent with the id.
    fn next_free_tracking_id(&self) -> i32 {
        let (minimum, maximum) = match self.descriptor().axis(ABS_MT_TRACKING_ID) {
            Some(info) => (info.minimum.max(0), info.maximum),
            None => (0, i32::max_value()),
        };
        let mut candidate = if self.next_tracking_id > maximum || self.next_tracking_id < minimum {
            minimum
        } else {
            self.next_tracking_id
        };
        // with fewer declared ids than slots this gives up and lets the
        // tracker report the duplicate
        for _ in 0..self.tracker.capacity() {
            let tracker = &self.tracker;
            if !tracker
                .active_slots()
                .any(|slot| tracker.slot(slot).map_or(false, |s| s.tracking_id() == candidate))
            {
                break;
            }
            candidate = if candidate >= maximum {
                minimum
            } else {
                candidate + 1
            };
        }
        candidate
    }

    fn pointer_count(tracker: &SlotTracker) -> usize {
        tracker.pointer_slots().count()
    }

    pub fn pointer_down(
        &mut self,
        slot: usize,
        tool_type: ToolType,
        position: Position,
    ) -> Result<Option<ExpectedMotion>> {
        let tracking_id = self.next_free_tracking_id();
        let mut next = self.tracker.clone();
        next.down(slot, tracking_id, tool_type, position)?;
        let first = self.tracker.active_slots().next().is_none();
        self.injector.select_slot(slot)?;
        self.injector.set_tracking_id(tracking_id)?;
        self.injector.set_tool_type(tool_type)?;
        self.injector.set_position(position)?;
        let mut tool = None;
        if first {
            self.injector.set_button_if_declared(BTN_TOUCH, true)?;
            tool = tool_key(tool_type).filter(|key| self.descriptor().has_key(*key));
            if let Some(key) = tool {
                self.injector.set_button(key, true)?;
            }
        }
        self.injector.sync()?;
        self.tracker = next;
        self.next_tracking_id = tracking_id.wrapping_add(1);
        if first {
            self.pressed_tool_key = tool;
        }
        Ok(self.tracker.pointer_index(slot).map(|index| {
            let action = if Self::pointer_count(&self.tracker) == 1 {
                MotionAction::Down
            } else {
                MotionAction::PointerDown { index }
            };
            ExpectedMotion::new(action).tool_type(tool_type)
        }))
    }

    pub fn pointer_move(&mut self, slot: usize, position: Position) -> Result<Option<ExpectedMotion>> {
        let mut next = self.tracker.clone();
        next.move_to(slot, position)?;
        self.injector.select_slot(slot)?;
        self.injector.set_position(position)?;
        self.injector.sync()?;
        self.tracker = next;
        Ok(self.tracker.pointer_index(slot).and_then(|_| {
            self.tracker
                .slot(slot)
                .ok()
                .and_then(|touch_slot| touch_slot.contact)
                .map(|contact| ExpectedMotion::new(MotionAction::Move).tool_type(contact.tool_type))
        }))
    }

    /// Changing to a palm cancels the pointer: the remaining pointers see a
    /// canceled pointer-up, a lone pointer a cancel.
    pub fn change_tool_type(
        &mut self,
        slot: usize,
        tool_type: ToolType,
    ) -> Result<Option<ExpectedMotion>> {
        let mut next = self.tracker.clone();
        let transition = next.change_tool(slot, tool_type)?;
        self.injector.select_slot(slot)?;
        self.injector.set_tool_type(tool_type)?;
        self.injector.sync()?;
        let index_before = self.tracker.pointer_index(slot);
        let count_before = Self::pointer_count(&self.tracker);
        self.tracker = next;
        let expected = match (transition, index_before) {
            (Transition::Cancelled, Some(index)) => {
                let action = if count_before > 1 {
                    MotionAction::PointerUp { index }
                } else {
                    MotionAction::Cancel
                };
                Some(ExpectedMotion::new(action).canceled(true))
            }
            (Transition::Cancelled, None) => None,
            (_, Some(_)) => Some(ExpectedMotion::new(MotionAction::Move).tool_type(tool_type)),
            (_, None) => self.tracker.pointer_index(slot).map(|index| {
                let action = if Self::pointer_count(&self.tracker) == 1 {
                    MotionAction::Down
                } else {
                    MotionAction::PointerDown { index }
                };
                ExpectedMotion::new(action).tool_type(tool_type)
            }),
        };
        Ok(expected)
    }

    pub fn pointer_up(&mut self, slot: usize) -> Result<Option<ExpectedMotion>> {
        let mut next = self.tracker.clone();
        let transition = next.up(slot)?;
        let last = next.active_slots().next().is_none();
        self.injector.select_slot(slot)?;
        self.injector.set_tracking_id(-1)?;
        if last {
            self.injector.set_button_if_declared(BTN_TOUCH, false)?;
            if let Some(key) = self.pressed_tool_key {
                self.injector.set_button(key, false)?;
            }
        }
        self.injector.sync()?;
        let index_before = self.tracker.pointer_index(slot);
        let count_before = Self::pointer_count(&self.tracker);
        let tool_type = self
            .tracker
            .slot(slot)
            .ok()
            .and_then(|touch_slot| touch_slot.contact)
            .map(|contact| contact.tool_type);
        self.tracker = next;
        if last {
            self.pressed_tool_key = None;
        }
        Ok(match (transition, index_before, tool_type) {
            (Transition::Up, Some(index), Some(tool_type)) => {
                let action = if count_before == 1 {
                    MotionAction::Up
                } else {
                    MotionAction::PointerUp { index }
                };
                Some(ExpectedMotion::new(action).tool_type(tool_type))
            }
            _ => None,
        })
    }

    pub fn press_button(&mut self, code: u16) -> Result<ExpectedMotion> {
        self.injector.set_button(code, true)?;
        self.injector.sync()?;
        let pressed = stylus_button(code).unwrap_or(0);
        self.button_state |= pressed;
        Ok(ExpectedMotion::new(MotionAction::ButtonPress)
            .action_button(pressed)
            .buttons(self.button_state))
    }

    pub fn release_button(&mut self, code: u16) -> Result<ExpectedMotion> {
        self.injector.set_button(code, false)?;
        self.injector.sync()?;
        let released = stylus_button(code).unwrap_or(0);
        self.button_state &= !released;
        Ok(ExpectedMotion::new(MotionAction::ButtonRelease)
            .action_button(released)
            .buttons(self.button_state))
    }
}
