use crate::descriptor::{CapabilityDescriptor, DescriptorError};
use crate::error::Result;
use crate::evdev::*;
use crate::host::Transport;
use crate::registration::encode_inject;
use crate::slots::ToolType;
use log::debug;
use std::mem;

/// Receives complete batches of raw events.
pub trait EventSink {
    fn inject(&mut self, events: &[RawEvent]) -> Result<()>;
}

impl EventSink for Vec<Vec<RawEvent>> {
    fn inject(&mut self, events: &[RawEvent]) -> Result<()> {
        self.push(events.to_vec());
        Ok(())
    }
}

/// Sends batches straight to a transport without waiting for the device to
/// show up, for command scripts.
pub struct TransportSink<T: Transport> {
    pub id: u32,
    pub transport: T,
}

impl<T: Transport> EventSink for TransportSink<T> {
    fn inject(&mut self, events: &[RawEvent]) -> Result<()> {
        let command = encode_inject(self.id, events)?;
        self.transport.submit(&command)
    }
}

/// Collects the events of one logical update and sends them as a single
/// batch on `sync`.
///
/// Every value is checked against the descriptor before it is buffered. A
/// rejected value discards the whole pending batch, so a half-built update is
/// never sent.
pub struct EventInjector<S: EventSink> {
    descriptor: CapabilityDescriptor,
    sink: S,
    pending: Vec<RawEvent>,
}

impl<S: EventSink> EventInjector<S> {
    pub fn new(descriptor: CapabilityDescriptor, sink: S) -> EventInjector<S> {
        EventInjector {
            descriptor,
            sink,
            pending: vec![],
        }
    }

    pub fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn pending(&self) -> &[RawEvent] {
        &self.pending
    }

    fn reject(&mut self, error: DescriptorError) -> Result<()> {
        self.pending.clear();
        Err(error.into())
    }

    pub fn set_abs(&mut self, code: u16, value: i32) -> Result<()> {
        let info = match self.descriptor.axis(code) {
            None => return self.reject(DescriptorError::UndeclaredAxis(code)),
            Some(info) => *info,
        };
        let lifted = code == ABS_MT_TRACKING_ID && value == -1;
        if !lifted && !info.contains(value) {
            return self.reject(DescriptorError::ValueOutOfRange {
                code,
                value,
                minimum: info.minimum,
                maximum: info.maximum,
            });
        }
        self.pending.push(RawEvent::new(EV_ABS_TYPE, code, value));
        Ok(())
    }

    pub fn select_slot(&mut self, slot: usize) -> Result<()> {
        self.set_abs(ABS_MT_SLOT, slot as i32)
    }

    /// `-1` lifts the contact in the selected slot.
    pub fn set_tracking_id(&mut self, tracking_id: i32) -> Result<()> {
        self.set_abs(ABS_MT_TRACKING_ID, tracking_id)
    }

    pub fn set_tool_type(&mut self, tool_type: ToolType) -> Result<()> {
        self.set_abs(ABS_MT_TOOL_TYPE, tool_type.mt_tool())
    }

    pub fn set_position(&mut self, position: Position) -> Result<()> {
        if self.descriptor.is_multi_touch() {
            self.set_abs(ABS_MT_POSITION_X, position.x)?;
            self.set_abs(ABS_MT_POSITION_Y, position.y)
        } else {
            self.set_abs(ABS_X, position.x)?;
            self.set_abs(ABS_Y, position.y)
        }
    }

    pub fn set_pressure(&mut self, pressure: i32) -> Result<()> {
        if self.descriptor.is_multi_touch() {
            self.set_abs(ABS_MT_PRESSURE, pressure)
        } else {
            self.set_abs(ABS_PRESSURE, pressure)
        }
    }

    pub fn set_button(&mut self, code: u16, pressed: bool) -> Result<()> {
        if !self.descriptor.has_key(code) {
            return self.reject(DescriptorError::UndeclaredKey(code));
        }
        self.pending
            .push(RawEvent::new(EV_KEY_TYPE, code, pressed as i32));
        Ok(())
    }

    /// Sets a key only when the device declares it.
    pub fn set_button_if_declared(&mut self, code: u16, pressed: bool) -> Result<()> {
        if self.descriptor.has_key(code) {
            self.set_button(code, pressed)
        } else {
            Ok(())
        }
    }

    /// Sends the pending events followed by a `SYN_REPORT`. An empty batch is
    /// a bare report.
    pub fn sync(&mut self) -> Result<()> {
        let batch = mem::replace(&mut self.pending, vec![]);
        debug!("{}: injecting {} events", self.descriptor.name, batch.len());
        self.sink.inject(&batch)
    }
}
