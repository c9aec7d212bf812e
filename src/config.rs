//! Custom device descriptions read from TOML files, for devices none of the
//! built-in templates cover.
//!
//! ```toml
//! name = "Custom Touchpad"
//! product_id = 0x1234
//! port = "usb:5"
//! event_types = [1, 3]
//! keys = [0x14a]
//! properties = [1]
//! surface = [1080, 1920]
//!
//! [[axes]]
//! code = 0x2f
//! minimum = 0
//! maximum = 4
//! ```

use crate::descriptor::{AbsInfo, Capability, CapabilityDescriptor, GOOGLE_VENDOR_ID};
use crate::error::Result;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AxisEntry {
    pub code: u16,
    #[serde(default)]
    pub value: i32,
    #[serde(default)]
    pub minimum: i32,
    #[serde(default)]
    pub maximum: i32,
    #[serde(default)]
    pub fuzz: i32,
    #[serde(default)]
    pub flat: i32,
    #[serde(default)]
    pub resolution: i32,
}

impl AxisEntry {
    fn info(&self) -> AbsInfo {
        AbsInfo {
            value: self.value,
            minimum: self.minimum,
            maximum: self.maximum,
            fuzz: self.fuzz,
            flat: self.flat,
            resolution: self.resolution,
        }
    }
}

fn default_id() -> u32 {
    1
}

fn default_vendor_id() -> u16 {
    GOOGLE_VENDOR_ID
}

fn default_bus() -> String {
    "usb".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeviceFile {
    #[serde(default = "default_id")]
    pub id: u32,
    pub name: String,
    #[serde(default = "default_vendor_id")]
    pub vendor_id: u16,
    pub product_id: u16,
    #[serde(default = "default_bus")]
    pub bus: String,
    #[serde(default)]
    pub port: String,
    #[serde(default)]
    pub event_types: Vec<u16>,
    #[serde(default)]
    pub keys: Vec<u16>,
    #[serde(default)]
    pub properties: Vec<u16>,
    #[serde(default)]
    pub axes: Vec<AxisEntry>,
    /// Fits the position axes to `[width, height]`.
    pub surface: Option<(i32, i32)>,
}

impl DeviceFile {
    pub fn parse(input: &str) -> Result<DeviceFile> {
        Ok(toml::from_str(input)?)
    }

    pub fn load(path: &Path) -> Result<DeviceFile> {
        DeviceFile::parse(&fs::read_to_string(path)?)
    }

    pub fn into_descriptor(self) -> Result<CapabilityDescriptor> {
        let mut builder = CapabilityDescriptor::builder(&self.name)
            .id(self.id)
            .vendor_id(self.vendor_id)
            .product_id(self.product_id)
            .bus(&self.bus)
            .port(&self.port);
        for event_type in self.event_types.iter() {
            builder = builder.capability(Capability::EvBit(*event_type));
        }
        for key in self.keys.iter() {
            builder = builder.key_code(*key);
        }
        for property in self.properties.iter() {
            builder = builder.property(*property);
        }
        for axis in self.axes.iter() {
            builder = builder.axis_code(axis.code, axis.info());
        }
        let descriptor = match self.surface {
            None => builder.build(),
            Some((width, height)) => builder.build().fit_to_surface(width, height)?,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }
}
