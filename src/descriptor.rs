use crate::evdev::*;
use crate::transform::Size;
use crate::verifier::source;
use ::evdev_rs::enums::{EventType, EV_ABS, EV_KEY};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

pub const GOOGLE_VENDOR_ID: u16 = 0x18d1;

/// Upper bound on `ABS_MT_SLOT` maximum plus one.
pub const MAX_SLOTS: i32 = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    #[error("code {code:#x} needs event type {event_type:#x}, which is not declared")]
    MissingEventType { event_type: u16, code: u16 },
    #[error("axis {0:#x} is not declared")]
    UndeclaredAxis(u16),
    #[error("key {0:#x} is not declared")]
    UndeclaredKey(u16),
    #[error("axis {0:#x} has no maximum, fit the descriptor to a surface first")]
    AxisMaximumUnset(u16),
    #[error("value {value} for axis {code:#x} is outside [{minimum}, {maximum}]")]
    ValueOutOfRange {
        code: u16,
        value: i32,
        minimum: i32,
        maximum: i32,
    },
    #[error("slot axis [{minimum}, {maximum}] must start at 0 and hold at most 64 slots")]
    InvalidSlotRange { minimum: i32, maximum: i32 },
    #[error("cannot fit to an empty surface {width}x{height}")]
    EmptySurface { width: i32, height: i32 },
    #[error("unknown template '{0}'")]
    UnknownTemplate(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AbsInfo {
    #[serde(default)]
    pub value: i32,
    pub minimum: i32,
    pub maximum: i32,
    #[serde(default)]
    pub fuzz: i32,
    #[serde(default)]
    pub flat: i32,
    #[serde(default)]
    pub resolution: i32,
}

impl AbsInfo {
    pub fn range(minimum: i32, maximum: i32) -> AbsInfo {
        AbsInfo {
            minimum,
            maximum,
            ..AbsInfo::default()
        }
    }

    /// A position axis whose maximum is only known once the target surface is.
    pub fn unfitted() -> AbsInfo {
        AbsInfo::default()
    }

    pub fn contains(&self, value: i32) -> bool {
        value >= self.minimum && value <= self.maximum
    }
}

/// One entry of the uinput configuration list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Capability {
    EvBit(u16),
    KeyBit(u16),
    AbsBit(u16),
    PropBit(u16),
}

custom_derive! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, IterVariants(TemplateVariants))]
    pub enum Template {
        Touchscreen,
        Stylus,
        DrawingTablet,
        Keyboard,
    }
}

impl Template {
    pub fn parse(name: &str) -> Result<Template, DescriptorError> {
        Template::iter_variants()
            .find(|template| format!("{:?}", template).eq_ignore_ascii_case(name))
            .ok_or_else(|| DescriptorError::UnknownTemplate(name.to_string()))
    }
}

fn is_x_axis(code: u16) -> bool {
    code == ABS_X || code == ABS_MT_POSITION_X
}

fn is_y_axis(code: u16) -> bool {
    code == ABS_Y || code == ABS_MT_POSITION_Y
}

fn is_position_axis(code: u16) -> bool {
    is_x_axis(code) || is_y_axis(code)
}

const BTN_MISC: u16 = 0x100;

#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityDescriptor {
    pub id: u32,
    pub name: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub bus: String,
    pub port: String,
    capabilities: BTreeSet<Capability>,
    abs_axes: BTreeMap<u16, AbsInfo>,
}

impl CapabilityDescriptor {
    pub fn builder(name: &str) -> DescriptorBuilder {
        DescriptorBuilder {
            descriptor: CapabilityDescriptor {
                id: 1,
                name: name.to_string(),
                vendor_id: GOOGLE_VENDOR_ID,
                product_id: 0,
                bus: "usb".to_string(),
                port: String::new(),
                capabilities: BTreeSet::new(),
                abs_axes: BTreeMap::new(),
            },
        }
    }

    pub fn from_template(template: Template) -> CapabilityDescriptor {
        let touch_axes = |builder: DescriptorBuilder| {
            builder
                .event_type(EventType::EV_KEY)
                .event_type(EventType::EV_ABS)
                .property(INPUT_PROP_DIRECT)
                .key(EV_KEY::BTN_TOUCH)
                .key(EV_KEY::BTN_TOOL_FINGER)
                .axis(EV_ABS::ABS_MT_SLOT, AbsInfo::range(0, 9))
                .axis(EV_ABS::ABS_MT_TRACKING_ID, AbsInfo::range(0, 0xffff))
                .axis(EV_ABS::ABS_MT_POSITION_X, AbsInfo::unfitted())
                .axis(EV_ABS::ABS_MT_POSITION_Y, AbsInfo::unfitted())
                .axis(
                    EV_ABS::ABS_MT_TOOL_TYPE,
                    AbsInfo::range(MT_TOOL_FINGER, MT_TOOL_PALM),
                )
                .axis(EV_ABS::ABS_MT_PRESSURE, AbsInfo::range(0, 255))
        };
        match template {
            Template::Touchscreen => touch_axes(
                CapabilityDescriptor::builder("Virtual Touchscreen").product_id(0xabcd),
            )
            .build(),
            Template::Stylus => touch_axes(
                CapabilityDescriptor::builder("Virtual Stylus").product_id(0xabce),
            )
            .key(EV_KEY::BTN_TOOL_PEN)
            .key(EV_KEY::BTN_STYLUS)
            .key(EV_KEY::BTN_STYLUS2)
            .build(),
            Template::DrawingTablet => {
                CapabilityDescriptor::builder("Virtual Drawing Tablet")
                    .product_id(0xabcf)
                    .event_type(EventType::EV_KEY)
                    .event_type(EventType::EV_ABS)
                    .property(INPUT_PROP_POINTER)
                    .key(EV_KEY::BTN_TOUCH)
                    .key(EV_KEY::BTN_TOOL_PEN)
                    .key(EV_KEY::BTN_STYLUS)
                    .key(EV_KEY::BTN_STYLUS2)
                    .axis(EV_ABS::ABS_X, AbsInfo::unfitted())
                    .axis(EV_ABS::ABS_Y, AbsInfo::unfitted())
                    .axis(EV_ABS::ABS_PRESSURE, AbsInfo::range(0, 4095))
                    .build()
            }
            Template::Keyboard => {
                // KEY_ESC through KEY_F12
                let mut builder = CapabilityDescriptor::builder("Virtual Keyboard")
                    .product_id(0xabd0)
                    .event_type(EventType::EV_KEY);
                for code in 1..=88 {
                    builder = builder.key_code(code);
                }
                builder.build()
            }
        }
    }

    /// Sets the maxima of all position axes to the last pixel of a
    /// `width` x `height` surface.
    pub fn fit_to_surface(
        mut self,
        width: i32,
        height: i32,
    ) -> Result<CapabilityDescriptor, DescriptorError> {
        if width <= 0 || height <= 0 {
            return Err(DescriptorError::EmptySurface { width, height });
        }
        for (code, info) in self.abs_axes.iter_mut() {
            if is_x_axis(*code) {
                info.maximum = width - 1;
            } else if is_y_axis(*code) {
                info.maximum = height - 1;
            }
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), DescriptorError> {
        for capability in self.capabilities.iter() {
            let (event_type, code) = match *capability {
                Capability::KeyBit(code) => (EV_KEY_TYPE, code),
                Capability::AbsBit(code) => (EV_ABS_TYPE, code),
                _ => continue,
            };
            if !self.has_event_type(event_type) {
                return Err(DescriptorError::MissingEventType { event_type, code });
            }
        }
        for (code, info) in self.abs_axes.iter() {
            if !self.capabilities.contains(&Capability::AbsBit(*code)) {
                return Err(DescriptorError::UndeclaredAxis(*code));
            }
            if is_position_axis(*code) && info.maximum <= info.minimum {
                return Err(DescriptorError::AxisMaximumUnset(*code));
            }
        }
        if let Some(slots) = self.axis(ABS_MT_SLOT) {
            if slots.minimum != 0 || slots.maximum < 0 || slots.maximum >= MAX_SLOTS {
                return Err(DescriptorError::InvalidSlotRange {
                    minimum: slots.minimum,
                    maximum: slots.maximum,
                });
            }
        }
        if self.is_multi_touch() && !self.abs_axes.contains_key(&ABS_MT_TRACKING_ID) {
            return Err(DescriptorError::UndeclaredAxis(ABS_MT_TRACKING_ID));
        }
        Ok(())
    }

    pub fn capabilities(&self) -> impl Iterator<Item = &Capability> {
        self.capabilities.iter()
    }

    pub fn abs_axes(&self) -> impl Iterator<Item = (u16, &AbsInfo)> {
        self.abs_axes.iter().map(|(code, info)| (*code, info))
    }

    pub fn axis(&self, code: u16) -> Option<&AbsInfo> {
        self.abs_axes.get(&code)
    }

    pub fn has_event_type(&self, event_type: u16) -> bool {
        self.capabilities.contains(&Capability::EvBit(event_type))
    }

    pub fn has_key(&self, code: u16) -> bool {
        self.capabilities.contains(&Capability::KeyBit(code))
    }

    pub fn has_property(&self, property: u16) -> bool {
        self.capabilities.contains(&Capability::PropBit(property))
    }

    pub fn is_multi_touch(&self) -> bool {
        self.abs_axes.contains_key(&ABS_MT_SLOT)
    }

    pub fn slot_capacity(&self) -> usize {
        match self.axis(ABS_MT_SLOT) {
            Some(info) => info
                .maximum
                .checked_sub(info.minimum)
                .and_then(|span| span.checked_add(1))
                .filter(|count| *count > 0)
                .map_or(0, |count| count.min(MAX_SLOTS) as usize),
            None => 0,
        }
    }

    /// The raw coordinate space, `maximum + 1` of the position axes.
    pub fn surface_size(&self) -> Option<Size> {
        let (x, y) = if self.is_multi_touch() {
            (ABS_MT_POSITION_X, ABS_MT_POSITION_Y)
        } else {
            (ABS_X, ABS_Y)
        };
        match (self.axis(x), self.axis(y)) {
            (Some(x), Some(y)) if x.maximum > x.minimum && y.maximum > y.minimum => Some(Size {
                width: x.maximum + 1,
                height: y.maximum + 1,
            }),
            _ => None,
        }
    }

    /// Input sources the OS is expected to report for this device.
    pub fn expected_sources(&self) -> u32 {
        let mut sources = 0;
        let pen = self.has_key(BTN_TOOL_PEN);
        if self.is_multi_touch() && self.has_property(INPUT_PROP_DIRECT) {
            sources |= source::TOUCHSCREEN;
            if pen {
                sources |= source::STYLUS;
            }
        } else if self.axis(ABS_X).is_some() && pen {
            sources |= source::MOUSE | source::STYLUS;
        }
        if self.capabilities.iter().any(|capability| match capability {
            Capability::KeyBit(code) => *code < BTN_MISC,
            _ => false,
        }) {
            sources |= source::KEYBOARD;
        }
        sources
    }
}

pub struct DescriptorBuilder {
    descriptor: CapabilityDescriptor,
}

impl DescriptorBuilder {
    pub fn id(mut self, id: u32) -> Self {
        self.descriptor.id = id;
        self
    }

    pub fn vendor_id(mut self, vendor_id: u16) -> Self {
        self.descriptor.vendor_id = vendor_id;
        self
    }

    pub fn product_id(mut self, product_id: u16) -> Self {
        self.descriptor.product_id = product_id;
        self
    }

    pub fn bus(mut self, bus: &str) -> Self {
        self.descriptor.bus = bus.to_string();
        self
    }

    pub fn port(mut self, port: &str) -> Self {
        self.descriptor.port = port.to_string();
        self
    }

    pub fn capability(mut self, capability: Capability) -> Self {
        self.descriptor.capabilities.insert(capability);
        self
    }

    pub fn event_type(self, event_type: EventType) -> Self {
        self.capability(Capability::EvBit(event_type as u16))
    }

    pub fn key(self, key: EV_KEY) -> Self {
        self.key_code(key as u16)
    }

    pub fn key_code(self, code: u16) -> Self {
        self.capability(Capability::KeyBit(code))
    }

    pub fn property(self, property: u16) -> Self {
        self.capability(Capability::PropBit(property))
    }

    pub fn axis(self, axis: EV_ABS, info: AbsInfo) -> Self {
        self.axis_code(axis as u16, info)
    }

    pub fn axis_code(mut self, code: u16, info: AbsInfo) -> Self {
        self.descriptor.abs_axes.insert(code, info);
        self.capability(Capability::AbsBit(code))
    }

    pub fn build(self) -> CapabilityDescriptor {
        self.descriptor
    }
}
