use crate::evdev::{Position, MT_TOOL_FINGER, MT_TOOL_PALM, MT_TOOL_PEN};
use thiserror::Error;

custom_derive! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, IterVariants(ToolTypeVariants))]
    pub enum ToolType {
        Finger,
        Pen,
        Palm,
    }
}

impl ToolType {
    pub fn mt_tool(self) -> i32 {
        match self {
            ToolType::Finger => MT_TOOL_FINGER,
            ToolType::Pen => MT_TOOL_PEN,
            ToolType::Palm => MT_TOOL_PALM,
        }
    }

    /// Palms are reported to the kernel but never dispatched as pointers.
    pub fn is_pointer(self) -> bool {
        self != ToolType::Palm
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("slot {slot} is out of range, the device has {capacity} slots")]
    SlotOutOfRange { slot: usize, capacity: usize },
    #[error("slot {slot} is already down with tracking id {tracking_id}")]
    AlreadyDown { slot: usize, tracking_id: i32 },
    #[error("slot {slot} is not down")]
    NotDown { slot: usize },
    #[error("slot {slot} has been cancelled and only accepts an up")]
    Cancelled { slot: usize },
    #[error("tracking id {tracking_id} is already used by slot {slot}")]
    DuplicateTrackingId { tracking_id: i32, slot: usize },
    #[error("tracking id {0} is negative")]
    NegativeTrackingId(i32),
    #[error("cannot {operation} while the pen is {state}")]
    PenState {
        operation: &'static str,
        state: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Inactive,
    Down,
    Moving,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contact {
    pub tracking_id: i32,
    pub tool_type: ToolType,
    pub position: Position,
    /// The id the receiver gives this contact's pointer, `None` for palms
    /// and cancelled contacts.
    pub pointer_id: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchSlot {
    pub state: SlotState,
    pub contact: Option<Contact>,
}

impl TouchSlot {
    const INACTIVE: TouchSlot = TouchSlot {
        state: SlotState::Inactive,
        contact: None,
    };

    pub fn is_active(&self) -> bool {
        self.state != SlotState::Inactive
    }

    /// `-1` for inactive slots, like `ABS_MT_TRACKING_ID`.
    pub fn tracking_id(&self) -> i32 {
        self.contact.map_or(-1, |contact| contact.tracking_id)
    }
}

/// What a slot update means for the higher-level pointer stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Down,
    Moved,
    ToolChanged,
    Cancelled,
    Up,
    /// The slot was cancelled earlier, lifting it produces no pointer event.
    Released,
}

/// Per-device multi-touch protocol state: which slots hold a contact and
/// what each contact looks like.
#[derive(Debug, Clone)]
pub struct SlotTracker {
    slots: Vec<TouchSlot>,
}

impl SlotTracker {
    pub fn new(capacity: usize) -> SlotTracker {
        SlotTracker {
            slots: vec![TouchSlot::INACTIVE; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, slot: usize) -> Result<&TouchSlot, ProtocolError> {
        let capacity = self.capacity();
        self.slots
            .get(slot)
            .ok_or(ProtocolError::SlotOutOfRange { slot, capacity })
    }

    fn slot_mut(&mut self, slot: usize) -> Result<&mut TouchSlot, ProtocolError> {
        let capacity = self.capacity();
        self.slots
            .get_mut(slot)
            .ok_or(ProtocolError::SlotOutOfRange { slot, capacity })
    }

    pub fn down(
        &mut self,
        slot: usize,
        tracking_id: i32,
        tool_type: ToolType,
        position: Position,
    ) -> Result<Transition, ProtocolError> {
        if tracking_id < 0 {
            return Err(ProtocolError::NegativeTrackingId(tracking_id));
        }
        let current = *self.slot(slot)?;
        if current.is_active() {
            return Err(ProtocolError::AlreadyDown {
                slot,
                tracking_id: current.tracking_id(),
            });
        }
        if let Some(other) = self
            .slots
            .iter()
            .position(|other| other.tracking_id() == tracking_id)
        {
            return Err(ProtocolError::DuplicateTrackingId {
                tracking_id,
                slot: other,
            });
        }
        let pointer_id = if tool_type.is_pointer() {
            Some(self.lowest_free_pointer_id())
        } else {
            None
        };
        *self.slot_mut(slot)? = TouchSlot {
            state: SlotState::Down,
            contact: Some(Contact {
                tracking_id,
                tool_type,
                position,
                pointer_id,
            }),
        };
        Ok(Transition::Down)
    }

    pub fn move_to(&mut self, slot: usize, position: Position) -> Result<Transition, ProtocolError> {
        let touch_slot = self.slot_mut(slot)?;
        match (touch_slot.state, touch_slot.contact.as_mut()) {
            (SlotState::Down, Some(contact)) | (SlotState::Moving, Some(contact)) => {
                contact.position = position;
                touch_slot.state = SlotState::Moving;
                Ok(Transition::Moved)
            }
            (SlotState::Cancelled, _) => Err(ProtocolError::Cancelled { slot }),
            _ => Err(ProtocolError::NotDown { slot }),
        }
    }

    pub fn change_tool(&mut self, slot: usize, tool_type: ToolType) -> Result<Transition, ProtocolError> {
        let free_pointer_id = self.lowest_free_pointer_id();
        let touch_slot = self.slot_mut(slot)?;
        match (touch_slot.state, touch_slot.contact.as_mut()) {
            (SlotState::Down, Some(contact)) | (SlotState::Moving, Some(contact)) => {
                contact.tool_type = tool_type;
                if tool_type.is_pointer() {
                    contact.pointer_id = contact.pointer_id.or(Some(free_pointer_id));
                    Ok(Transition::ToolChanged)
                } else {
                    contact.pointer_id = None;
                    touch_slot.state = SlotState::Cancelled;
                    Ok(Transition::Cancelled)
                }
            }
            (SlotState::Cancelled, _) => Err(ProtocolError::Cancelled { slot }),
            _ => Err(ProtocolError::NotDown { slot }),
        }
    }

    pub fn up(&mut self, slot: usize) -> Result<Transition, ProtocolError> {
        let touch_slot = self.slot_mut(slot)?;
        let transition = match touch_slot.state {
            SlotState::Inactive => return Err(ProtocolError::NotDown { slot }),
            SlotState::Cancelled => Transition::Released,
            SlotState::Down | SlotState::Moving => Transition::Up,
        };
        *touch_slot = TouchSlot::INACTIVE;
        Ok(transition)
    }

    pub fn active_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_active())
            .map(|(index, _)| index)
    }

    fn pointer_id(&self, slot: usize) -> Option<usize> {
        self.slots
            .get(slot)
            .and_then(|touch_slot| touch_slot.contact)
            .and_then(|contact| contact.pointer_id)
    }

    fn lowest_free_pointer_id(&self) -> usize {
        (0..)
            .find(|id| {
                !self
                    .slots
                    .iter()
                    .any(|slot| slot.contact.and_then(|c| c.pointer_id) == Some(*id))
            })
            .unwrap_or(0)
    }

    /// Slots whose contacts are dispatched as pointers, ordered by pointer id
    /// like the pointers of a motion event.
    pub fn pointer_slots(&self) -> impl Iterator<Item = usize> {
        let mut slots: Vec<(usize, usize)> = (0..self.capacity())
            .filter_map(|slot| self.pointer_id(slot).map(|id| (id, slot)))
            .collect();
        slots.sort();
        slots.into_iter().map(|(_, slot)| slot)
    }

    /// The index the receiver assigns to this slot's pointer. New contacts
    /// take the lowest free pointer id and indices follow pointer ids.
    pub fn pointer_index(&self, slot: usize) -> Option<usize> {
        let id = self.pointer_id(slot)?;
        Some(
            self.slots
                .iter()
                .filter_map(|other| other.contact.and_then(|c| c.pointer_id))
                .filter(|other| *other < id)
                .count(),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn pos(x: i32, y: i32) -> Position {
        Position { x, y }
    }

    fn tracker() -> SlotTracker {
        SlotTracker::new(4)
    }

    mod down {
        use super::*;

        #[test]
        fn activates_the_slot() {
            let mut tracker = tracker();
            assert_eq!(tracker.down(1, 7, ToolType::Finger, pos(1, 2)), Ok(Transition::Down));
            let slot = tracker.slot(1).unwrap();
            assert_eq!(slot.state, SlotState::Down);
            assert_eq!(slot.tracking_id(), 7);
        }

        #[test]
        fn rejects_a_second_down_without_up() {
            let mut tracker = tracker();
            tracker.down(0, 1, ToolType::Finger, pos(0, 0)).unwrap();
            assert_eq!(
                tracker.down(0, 2, ToolType::Finger, pos(0, 0)),
                Err(ProtocolError::AlreadyDown {
                    slot: 0,
                    tracking_id: 1
                })
            );
        }

        #[test]
        fn rejects_tracking_ids_used_by_another_live_slot() {
            let mut tracker = tracker();
            tracker.down(0, 5, ToolType::Finger, pos(0, 0)).unwrap();
            assert_eq!(
                tracker.down(1, 5, ToolType::Finger, pos(0, 0)),
                Err(ProtocolError::DuplicateTrackingId {
                    tracking_id: 5,
                    slot: 0
                })
            );
        }

        #[test]
        fn allows_reusing_tracking_ids_after_up() {
            let mut tracker = tracker();
            tracker.down(0, 5, ToolType::Finger, pos(0, 0)).unwrap();
            tracker.up(0).unwrap();
            assert_eq!(tracker.down(1, 5, ToolType::Finger, pos(0, 0)), Ok(Transition::Down));
        }

        #[test]
        fn rejects_slots_beyond_the_capacity() {
            assert_eq!(
                tracker().down(4, 0, ToolType::Finger, pos(0, 0)),
                Err(ProtocolError::SlotOutOfRange {
                    slot: 4,
                    capacity: 4
                })
            );
        }

        #[test]
        fn rejects_negative_tracking_ids() {
            assert_eq!(
                tracker().down(0, -1, ToolType::Finger, pos(0, 0)),
                Err(ProtocolError::NegativeTrackingId(-1))
            );
        }
    }

    mod move_to {
        use super::*;

        #[test]
        fn requires_a_down_first() {
            assert_eq!(
                tracker().move_to(0, pos(1, 1)),
                Err(ProtocolError::NotDown { slot: 0 })
            );
        }

        #[test]
        fn keeps_the_tracking_id() {
            let mut tracker = tracker();
            tracker.down(2, 9, ToolType::Finger, pos(0, 0)).unwrap();
            tracker.move_to(2, pos(5, 6)).unwrap();
            assert_eq!(tracker.move_to(2, pos(7, 8)), Ok(Transition::Moved));
            let slot = tracker.slot(2).unwrap();
            assert_eq!(slot.state, SlotState::Moving);
            assert_eq!(slot.tracking_id(), 9);
            assert_eq!(slot.contact.unwrap().position, pos(7, 8));
        }

        #[test]
        fn is_rejected_after_cancellation() {
            let mut tracker = tracker();
            tracker.down(0, 1, ToolType::Finger, pos(0, 0)).unwrap();
            tracker.change_tool(0, ToolType::Palm).unwrap();
            assert_eq!(
                tracker.move_to(0, pos(1, 1)),
                Err(ProtocolError::Cancelled { slot: 0 })
            );
        }
    }

    mod change_tool {
        use super::*;

        #[test]
        fn cancels_the_contact_when_switching_to_palm() {
            let mut tracker = tracker();
            tracker.down(0, 1, ToolType::Finger, pos(0, 0)).unwrap();
            assert_eq!(tracker.change_tool(0, ToolType::Palm), Ok(Transition::Cancelled));
            assert_eq!(tracker.slot(0).unwrap().state, SlotState::Cancelled);
            assert_eq!(tracker.slot(0).unwrap().tracking_id(), 1);
        }

        #[test]
        fn keeps_pointer_tools_active() {
            let mut tracker = tracker();
            tracker.down(0, 1, ToolType::Finger, pos(0, 0)).unwrap();
            assert_eq!(tracker.change_tool(0, ToolType::Pen), Ok(Transition::ToolChanged));
            assert_eq!(tracker.slot(0).unwrap().state, SlotState::Down);
        }

        #[test]
        fn requires_an_active_slot() {
            assert_eq!(
                tracker().change_tool(0, ToolType::Palm),
                Err(ProtocolError::NotDown { slot: 0 })
            );
        }
    }

    mod up {
        use super::*;

        #[test]
        fn returns_every_active_state_to_inactive() {
            let setups: Vec<fn(&mut SlotTracker)> = vec![
                |_| {},
                |tracker| {
                    tracker.move_to(0, pos(3, 3)).unwrap();
                },
                |tracker| {
                    tracker.change_tool(0, ToolType::Palm).unwrap();
                },
            ];
            for setup in setups {
                let mut tracker = tracker();
                tracker.down(0, 1, ToolType::Finger, pos(0, 0)).unwrap();
                setup(&mut tracker);
                assert!(tracker.up(0).is_ok());
                assert_eq!(*tracker.slot(0).unwrap(), TouchSlot::INACTIVE);
                assert_eq!(tracker.slot(0).unwrap().tracking_id(), -1);
            }
        }

        #[test]
        fn reports_cancelled_contacts_as_released() {
            let mut tracker = tracker();
            tracker.down(0, 1, ToolType::Finger, pos(0, 0)).unwrap();
            tracker.change_tool(0, ToolType::Palm).unwrap();
            assert_eq!(tracker.up(0), Ok(Transition::Released));
        }

        #[test]
        fn rejects_inactive_slots() {
            assert_eq!(tracker().up(3), Err(ProtocolError::NotDown { slot: 3 }));
        }
    }

    mod pointer_index {
        use super::*;

        #[test]
        fn follows_the_order_contacts_went_down() {
            let mut tracker = tracker();
            tracker.down(3, 1, ToolType::Finger, pos(0, 0)).unwrap();
            tracker.down(1, 2, ToolType::Finger, pos(0, 0)).unwrap();
            assert_eq!(tracker.pointer_index(3), Some(0));
            assert_eq!(tracker.pointer_index(1), Some(1));
            assert_eq!(tracker.pointer_index(0), None);
            assert_eq!(tracker.pointer_slots().collect::<Vec<_>>(), vec![3, 1]);
        }

        #[test]
        fn reuses_the_lowest_free_pointer_id() {
            let mut tracker = tracker();
            tracker.down(3, 1, ToolType::Finger, pos(0, 0)).unwrap();
            tracker.down(1, 2, ToolType::Finger, pos(0, 0)).unwrap();
            tracker.up(3).unwrap();
            assert_eq!(tracker.pointer_index(1), Some(0));
            tracker.down(2, 3, ToolType::Finger, pos(0, 0)).unwrap();
            assert_eq!(tracker.slot(2).unwrap().contact.unwrap().pointer_id, Some(0));
            assert_eq!(tracker.pointer_index(2), Some(0));
            assert_eq!(tracker.pointer_index(1), Some(1));
        }

        #[test]
        fn gives_palms_no_pointer() {
            let mut tracker = tracker();
            tracker.down(0, 1, ToolType::Palm, pos(0, 0)).unwrap();
            tracker.down(1, 2, ToolType::Finger, pos(0, 0)).unwrap();
            assert_eq!(tracker.pointer_index(0), None);
            assert_eq!(tracker.slot(1).unwrap().contact.unwrap().pointer_id, Some(0));
        }

        #[test]
        fn skips_cancelled_slots() {
            let mut tracker = tracker();
            tracker.down(0, 1, ToolType::Finger, pos(0, 0)).unwrap();
            tracker.down(1, 2, ToolType::Finger, pos(0, 0)).unwrap();
            tracker.change_tool(0, ToolType::Palm).unwrap();
            assert_eq!(tracker.pointer_index(1), Some(0));
            assert_eq!(tracker.active_slots().collect::<Vec<_>>(), vec![0, 1]);
        }
    }
}
