use crate::descriptor::CapabilityDescriptor;
use crate::error::{Error, Result};
use crate::evdev::RawEvent;
use crate::host::{
    Associations, DeviceMonitor, DeviceNotification, Display, DisplayAssociation, Transport,
};
use crate::injector::EventSink;
use crate::registration::{encode_delay, encode_inject, encode_register};
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

/// A registered virtual input device. The device is removed from the host
/// when the handle is closed or dropped.
pub struct VirtualDevice {
    descriptor: CapabilityDescriptor,
    transport: Option<Box<dyn Transport>>,
    os_device_id: i32,
}

impl VirtualDevice {
    /// Registers the device and waits until the OS reports it with the
    /// expected input sources.
    pub fn register(
        descriptor: CapabilityDescriptor,
        transport: impl Transport + 'static,
        monitor: &DeviceMonitor,
        timeout: Duration,
    ) -> Result<VirtualDevice> {
        let command = encode_register(&descriptor)?;
        let mut device = VirtualDevice {
            descriptor,
            transport: Some(Box::new(transport)),
            os_device_id: -1,
        };
        device.submit(&command)?;
        let descriptor = &device.descriptor;
        let observed = monitor.wait_for(timeout, |notification| match notification {
            DeviceNotification::Added(info)
                if info.name == descriptor.name
                    && info.vendor_id == descriptor.vendor_id
                    && info.product_id == descriptor.product_id =>
            {
                Some(info.clone())
            }
            _ => None,
        });
        let info = observed.ok_or_else(|| Error::DeviceNotObserved {
            name: descriptor.name.clone(),
            timeout,
        })?;
        let expected = descriptor.expected_sources();
        if info.sources & expected != expected {
            return Err(Error::WrongCapabilities {
                name: info.name,
                device_id: info.device_id,
                expected,
                actual: info.sources,
            });
        }
        device.os_device_id = info.device_id;
        info!(
            "registered '{}' as input device {}",
            device.descriptor.name, device.os_device_id
        );
        Ok(device)
    }

    pub fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    pub fn resource_id(&self) -> u32 {
        self.descriptor.id
    }

    pub fn os_device_id(&self) -> i32 {
        self.os_device_id
    }

    pub fn port(&self) -> &str {
        &self.descriptor.port
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    fn submit(&mut self, command: &str) -> Result<()> {
        match self.transport.as_mut() {
            None => Err(Error::NoSuchDevice(self.descriptor.name.clone())),
            Some(transport) => transport.submit(command),
        }
    }

    /// Binds the device to `display` until the returned guard is dropped.
    pub fn associate(
        &self,
        associations: Arc<dyn Associations>,
        display: &impl Display,
    ) -> Result<DisplayAssociation> {
        if self.port().is_empty() {
            return Err(Error::Usage(format!(
                "'{}' has no port to associate",
                self.descriptor.name
            )));
        }
        DisplayAssociation::new(associations, self.port(), &display.unique_id())
    }

    /// Asks the host to pause before processing further commands.
    pub fn delay(&mut self, duration: Duration) -> Result<()> {
        let command = encode_delay(self.descriptor.id, duration)?;
        self.submit(&command)
    }

    /// Closing an already closed device is an error without side effects.
    pub fn close(&mut self) -> Result<()> {
        match self.transport.take() {
            None => Err(Error::NoSuchDevice(self.descriptor.name.clone())),
            Some(mut transport) => {
                info!(
                    "closing '{}' (input device {})",
                    self.descriptor.name, self.os_device_id
                );
                transport.close()
            }
        }
    }

    /// Closes the device and waits until the OS has removed it.
    pub fn close_and_wait(&mut self, monitor: &DeviceMonitor, timeout: Duration) -> Result<()> {
        self.close()?;
        if !monitor.wait_for_removal(self.os_device_id, timeout) {
            warn!(
                "input device {} still present after {:?}",
                self.os_device_id, timeout
            );
        }
        Ok(())
    }
}

impl EventSink for VirtualDevice {
    fn inject(&mut self, events: &[RawEvent]) -> Result<()> {
        let command = encode_inject(self.descriptor.id, events)?;
        self.submit(&command)
    }
}

impl std::fmt::Debug for VirtualDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualDevice")
            .field("descriptor", &self.descriptor)
            .field("os_device_id", &self.os_device_id)
            .finish_non_exhaustive()
    }
}

impl Drop for VirtualDevice {
    fn drop(&mut self) {
        if self.is_open() {
            if let Err(error) = self.close() {
                warn!("closing '{}': {}", self.descriptor.name, error);
            }
        }
    }
}
