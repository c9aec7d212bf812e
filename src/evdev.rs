use ::evdev_rs::enums::{EventType, EV_ABS, EV_KEY, EV_SYN};
use ::log::warn;

pub const EV_SYN_TYPE: u16 = EventType::EV_SYN as u16;
pub const EV_KEY_TYPE: u16 = EventType::EV_KEY as u16;
pub const EV_ABS_TYPE: u16 = EventType::EV_ABS as u16;

pub const SYN_REPORT: u16 = EV_SYN::SYN_REPORT as u16;
pub const SYN_DROPPED: u16 = EV_SYN::SYN_DROPPED as u16;

pub const ABS_X: u16 = EV_ABS::ABS_X as u16;
pub const ABS_Y: u16 = EV_ABS::ABS_Y as u16;
pub const ABS_PRESSURE: u16 = EV_ABS::ABS_PRESSURE as u16;
pub const ABS_MT_SLOT: u16 = EV_ABS::ABS_MT_SLOT as u16;
pub const ABS_MT_POSITION_X: u16 = EV_ABS::ABS_MT_POSITION_X as u16;
pub const ABS_MT_POSITION_Y: u16 = EV_ABS::ABS_MT_POSITION_Y as u16;
pub const ABS_MT_TOOL_TYPE: u16 = EV_ABS::ABS_MT_TOOL_TYPE as u16;
pub const ABS_MT_TRACKING_ID: u16 = EV_ABS::ABS_MT_TRACKING_ID as u16;
pub const ABS_MT_PRESSURE: u16 = EV_ABS::ABS_MT_PRESSURE as u16;

pub const BTN_TOUCH: u16 = EV_KEY::BTN_TOUCH as u16;
pub const BTN_TOOL_FINGER: u16 = EV_KEY::BTN_TOOL_FINGER as u16;
pub const BTN_TOOL_PEN: u16 = EV_KEY::BTN_TOOL_PEN as u16;
pub const BTN_STYLUS: u16 = EV_KEY::BTN_STYLUS as u16;
pub const BTN_STYLUS2: u16 = EV_KEY::BTN_STYLUS2 as u16;

// input-event-codes.h, not covered by the evdev_rs enums
pub const INPUT_PROP_POINTER: u16 = 0x00;
pub const INPUT_PROP_DIRECT: u16 = 0x01;

pub const MT_TOOL_FINGER: i32 = 0;
pub const MT_TOOL_PEN: i32 = 1;
pub const MT_TOOL_PALM: i32 = 2;

/// One `(type, code, value)` triple as written to the uinput device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    pub event_type: u16,
    pub code: u16,
    pub value: i32,
}

impl RawEvent {
    pub fn new(event_type: u16, code: u16, value: i32) -> RawEvent {
        RawEvent {
            event_type,
            code,
            value,
        }
    }

    pub fn abs(axis: EV_ABS, value: i32) -> RawEvent {
        RawEvent::new(EV_ABS_TYPE, axis as u16, value)
    }

    pub fn key(key: EV_KEY, pressed: bool) -> RawEvent {
        RawEvent::new(EV_KEY_TYPE, key as u16, pressed as i32)
    }

    pub fn syn_report() -> RawEvent {
        RawEvent::new(EV_SYN_TYPE, SYN_REPORT, 0)
    }

    pub fn is_syn_report(&self) -> bool {
        self.event_type == EV_SYN_TYPE && self.code == SYN_REPORT
    }

    fn is_syn_dropped(&self) -> bool {
        self.event_type == EV_SYN_TYPE && self.code == SYN_DROPPED
    }

    pub fn triple(&self) -> [i32; 3] {
        [self.event_type as i32, self.code as i32, self.value]
    }
}

pub struct SynChunkSource {
    raw_event_source: Box<dyn Iterator<Item = RawEvent>>,
}

impl SynChunkSource {
    pub fn new(raw_event_source: impl Iterator<Item = RawEvent> + 'static) -> SynChunkSource {
        SynChunkSource {
            raw_event_source: Box::new(raw_event_source),
        }
    }
}

impl ::std::fmt::Debug for SynChunkSource {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        write!(f, "<SynChunkSource>")
    }
}

impl Iterator for SynChunkSource {
    type Item = Vec<RawEvent>;

    fn next(&mut self) -> Option<Vec<RawEvent>> {
        let mut result = vec![];
        loop {
            match self.raw_event_source.next() {
                None => {
                    if result.is_empty() {
                        return None;
                    } else {
                        break;
                    }
                }
                Some(event) => {
                    if event.is_syn_dropped() {
                        warn!("SynChunkSource: dropped events");
                    } else if event.is_syn_report() {
                        break;
                    } else {
                        result.push(event);
                    }
                }
            }
        }
        Some(result)
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy)]
struct SlotState {
    tracking_id: i32,
    position: Position,
    tool_type: i32,
    touching: bool,
}

#[derive(Debug, PartialEq, Clone)]
pub enum TouchState {
    NoTouch {
        slot: usize,
        tracking_id: i32,
    },
    Touch {
        slot: usize,
        tracking_id: i32,
        tool_type: i32,
        position: Position,
    },
}

#[derive(Debug)]
struct TouchStateChunkSource {
    syn_chunk_source: SynChunkSource,
    slots: Vec<SlotState>,
    active_slot: Option<usize>,
}

impl TouchStateChunkSource {
    fn new(syn_chunk_source: SynChunkSource, capacity: usize) -> TouchStateChunkSource {
        TouchStateChunkSource {
            syn_chunk_source,
            slots: vec![
                SlotState {
                    tracking_id: 0,
                    position: Position { x: 0, y: 0 },
                    tool_type: MT_TOOL_FINGER,
                    touching: false,
                };
                capacity
            ],
            active_slot: None,
        }
    }

    fn process_chunk(&mut self, chunk: Vec<RawEvent>) -> Vec<bool> {
        let mut changed = vec![false; self.slots.len()];
        for event in chunk {
            if event.event_type != EV_ABS_TYPE {
                continue;
            }
            if event.code == ABS_MT_SLOT {
                self.active_slot = if event.value >= 0 && (event.value as usize) < self.slots.len()
                {
                    Some(event.value as usize)
                } else {
                    None
                };
                continue;
            }
            let active_slot = match self.active_slot {
                None => continue,
                Some(active_slot) => active_slot,
            };
            let slot = &mut self.slots[active_slot];
            match event.code {
                ABS_MT_POSITION_X => slot.position.x = event.value,
                ABS_MT_POSITION_Y => slot.position.y = event.value,
                ABS_MT_TOOL_TYPE => slot.tool_type = event.value,
                ABS_MT_TRACKING_ID => match event.value {
                    -1 => slot.touching = false,
                    tracking_id => {
                        slot.tracking_id = tracking_id;
                        slot.touching = true;
                    }
                },
                _ => continue,
            }
            changed[active_slot] = true;
        }
        changed
    }

    fn get_touch_state_chunk(&self, changed: Vec<bool>) -> Vec<TouchState> {
        let mut result = vec![];
        for (slot, changed) in changed.into_iter().enumerate() {
            if changed {
                let slot_state = self.slots[slot];
                let touch_state = if slot_state.touching {
                    TouchState::Touch {
                        slot,
                        tracking_id: slot_state.tracking_id,
                        tool_type: slot_state.tool_type,
                        position: slot_state.position,
                    }
                } else {
                    TouchState::NoTouch {
                        slot,
                        tracking_id: slot_state.tracking_id,
                    }
                };
                result.push(touch_state)
            }
        }
        result
    }
}

impl Iterator for TouchStateChunkSource {
    type Item = Vec<TouchState>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.syn_chunk_source.next() {
            None => None,
            Some(chunk) => {
                let changed = self.process_chunk(chunk);
                Some(self.get_touch_state_chunk(changed))
            }
        }
    }
}

/// Replays a raw multi-touch stream and reports the per-slot contact updates
/// it encodes, one item per changed slot per batch.
pub struct TouchStateSource(::std::iter::Flatten<TouchStateChunkSource>);

impl TouchStateSource {
    pub fn new(
        raw_events: impl Iterator<Item = RawEvent> + 'static,
        capacity: usize,
    ) -> TouchStateSource {
        TouchStateSource(
            TouchStateChunkSource::new(SynChunkSource::new(raw_events), capacity).flatten(),
        )
    }
}

impl Iterator for TouchStateSource {
    type Item = TouchState;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next()
    }
}
