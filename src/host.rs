//! The collaborators outside this crate: the host tool that turns commands
//! into uinput devices, the OS reporting which input devices exist, and the
//! display the devices are bound to.

use crate::error::{Error, Result};
use crate::transform::{Rotation, Size};
use crossbeam::channel::{Receiver, RecvTimeoutError};
use log::{debug, info, warn};
use std::io::Write;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Carries commands to the host-side virtual device driver.
pub trait Transport {
    fn submit(&mut self, command: &str) -> Result<()>;

    /// Releases the channel. The host removes the device once it is closed.
    fn close(&mut self) -> Result<()>;
}

/// Writes one command per line.
pub struct CommandStream<W: Write> {
    writer: Option<W>,
}

impl<W: Write> CommandStream<W> {
    pub fn new(writer: W) -> CommandStream<W> {
        CommandStream {
            writer: Some(writer),
        }
    }
}

impl<W: Write> Transport for CommandStream<W> {
    fn submit(&mut self, command: &str) -> Result<()> {
        match self.writer.as_mut() {
            None => Err(Error::Transport("command stream is closed".to_string())),
            Some(writer) => {
                writeln!(writer, "{}", command)?;
                writer.flush()?;
                Ok(())
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }
}

/// The host `uinput` tool, fed through its stdin. Every process owns one
/// device.
pub struct UinputProcess {
    child: Child,
    stream: CommandStream<ChildStdin>,
}

impl UinputProcess {
    pub fn spawn(program: &str, args: &[&str]) -> Result<UinputProcess> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Transport(format!("{}: no stdin", program)))?;
        info!("spawned {} (pid {})", program, child.id());
        Ok(UinputProcess {
            child,
            stream: CommandStream::new(stdin),
        })
    }
}

impl Transport for UinputProcess {
    fn submit(&mut self, command: &str) -> Result<()> {
        self.stream.submit(command)
    }

    fn close(&mut self) -> Result<()> {
        self.stream.close()?;
        let status = self.child.wait()?;
        if !status.success() {
            warn!("uinput process exited with {}", status);
        }
        Ok(())
    }
}

/// Keeps every submitted command, for tests and dry runs.
#[derive(Clone, Default)]
pub struct Recording {
    commands: Arc<Mutex<Vec<String>>>,
    closed: Arc<Mutex<bool>>,
}

impl Recording {
    pub fn new() -> Recording {
        Recording::default()
    }

    pub fn commands(&self) -> Vec<String> {
        match self.commands.lock() {
            Ok(commands) => commands.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_closed(&self) -> bool {
        match self.closed.lock() {
            Ok(closed) => *closed,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

impl Transport for Recording {
    fn submit(&mut self, command: &str) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Transport("recording is closed".to_string()));
        }
        self.commands
            .lock()
            .map_err(|_| Error::Transport("recording mutex poisoned".to_string()))?
            .push(command.to_string());
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        *self
            .closed
            .lock()
            .map_err(|_| Error::Transport("recording mutex poisoned".to_string()))? = true;
        Ok(())
    }
}

/// An input device as enumerated by the OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDeviceInfo {
    pub device_id: i32,
    pub name: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub sources: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceNotification {
    Added(InputDeviceInfo),
    Removed(i32),
}

/// Bounded waits on the OS device notifications.
pub struct DeviceMonitor {
    receiver: Receiver<DeviceNotification>,
}

impl DeviceMonitor {
    pub fn new(receiver: Receiver<DeviceNotification>) -> DeviceMonitor {
        DeviceMonitor { receiver }
    }

    /// Returns the first notification `matches` accepts. Others are
    /// discarded. `None` once `timeout` has passed.
    pub fn wait_for<T, F>(&self, timeout: Duration, mut matches: F) -> Option<T>
    where
        F: FnMut(&DeviceNotification) -> Option<T>,
    {
        let deadline = Instant::now() + timeout;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            match self.receiver.recv_timeout(deadline - now) {
                Ok(notification) => match matches(&notification) {
                    Some(result) => return Some(result),
                    None => debug!("ignoring {:?}", notification),
                },
                Err(RecvTimeoutError::Timeout) => return None,
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("device notifications disconnected");
                    return None;
                }
            }
        }
    }

    pub fn wait_for_removal(&self, device_id: i32, timeout: Duration) -> bool {
        self.wait_for(timeout, |notification| match notification {
            DeviceNotification::Removed(id) if *id == device_id => Some(()),
            _ => None,
        })
        .is_some()
    }
}

/// Binds a device port to a display.
pub trait Associations: Send + Sync {
    fn associate(&self, port: &str, display_unique_id: &str) -> Result<()>;
    fn remove(&self, port: &str) -> Result<()>;
}

/// Removes its association when dropped.
pub struct DisplayAssociation {
    associations: Arc<dyn Associations>,
    port: String,
}

impl DisplayAssociation {
    pub fn new(
        associations: Arc<dyn Associations>,
        port: &str,
        display_unique_id: &str,
    ) -> Result<DisplayAssociation> {
        associations.associate(port, display_unique_id)?;
        Ok(DisplayAssociation {
            associations,
            port: port.to_string(),
        })
    }

    pub fn port(&self) -> &str {
        &self.port
    }
}

impl std::fmt::Debug for DisplayAssociation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisplayAssociation")
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

impl Drop for DisplayAssociation {
    fn drop(&mut self) {
        if let Err(error) = self.associations.remove(&self.port) {
            warn!("removing association for {}: {}", self.port, error);
        }
    }
}

pub trait Display {
    fn unique_id(&self) -> String;
    fn natural_size(&self) -> Size;
    fn rotation(&self) -> Rotation;
    fn set_rotation(&mut self, rotation: Rotation) -> Result<()>;
    /// Blocks until pending transitions have settled.
    fn wait_for_idle(&self, timeout: Duration) -> Result<()>;
}

/// Rotates a display for the lifetime of the guard. The rotation has settled
/// once `new` returns.
pub struct ScopedRotation<'a, D: Display> {
    display: &'a mut D,
    previous: Rotation,
    timeout: Duration,
}

impl<'a, D: Display> ScopedRotation<'a, D> {
    pub fn new(display: &'a mut D, rotation: Rotation, timeout: Duration) -> Result<Self> {
        let previous = display.rotation();
        display.set_rotation(rotation)?;
        let scoped = ScopedRotation {
            display,
            previous,
            timeout,
        };
        scoped.display.wait_for_idle(timeout)?;
        Ok(scoped)
    }

    pub fn display(&self) -> &D {
        self.display
    }
}

impl<'a, D: Display> std::fmt::Debug for ScopedRotation<'a, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedRotation")
            .field("previous", &self.previous)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl<'a, D: Display> Drop for ScopedRotation<'a, D> {
    fn drop(&mut self) {
        let restored = self
            .display
            .set_rotation(self.previous)
            .and_then(|()| self.display.wait_for_idle(self.timeout));
        if let Err(error) = restored {
            warn!("restoring {:?}: {}", self.previous, error);
        }
    }
}

#[cfg(test)]
pub mod test {
    use super::*;
    use assert_matches::assert_matches;
    use crossbeam::channel::unbounded;

    pub fn device_info(device_id: i32, name: &str, sources: u32) -> InputDeviceInfo {
        InputDeviceInfo {
            device_id,
            name: name.to_string(),
            vendor_id: crate::descriptor::GOOGLE_VENDOR_ID,
            product_id: 0xabcd,
            sources,
        }
    }

    #[derive(Default)]
    pub struct FakeAssociations {
        pub log: Mutex<Vec<String>>,
    }

    impl Associations for FakeAssociations {
        fn associate(&self, port: &str, display_unique_id: &str) -> Result<()> {
            self.log
                .lock()
                .unwrap()
                .push(format!("associate {} {}", port, display_unique_id));
            Ok(())
        }

        fn remove(&self, port: &str) -> Result<()> {
            self.log.lock().unwrap().push(format!("remove {}", port));
            Ok(())
        }
    }

    pub struct FakeDisplay {
        pub rotation: Rotation,
        pub settled: bool,
        pub history: Vec<Rotation>,
    }

    impl FakeDisplay {
        pub fn new() -> FakeDisplay {
            FakeDisplay {
                rotation: Rotation::Rotation0,
                settled: true,
                history: vec![],
            }
        }
    }

    impl Display for FakeDisplay {
        fn unique_id(&self) -> String {
            "local:0".to_string()
        }

        fn natural_size(&self) -> Size {
            Size {
                width: 480,
                height: 800,
            }
        }

        fn rotation(&self) -> Rotation {
            self.rotation
        }

        fn set_rotation(&mut self, rotation: Rotation) -> Result<()> {
            self.rotation = rotation;
            self.history.push(rotation);
            Ok(())
        }

        fn wait_for_idle(&self, timeout: Duration) -> Result<()> {
            if self.settled {
                Ok(())
            } else {
                Err(Error::DisplayNotIdle(timeout))
            }
        }
    }

    mod command_stream {
        use super::*;

        #[test]
        fn writes_one_command_per_line() {
            let mut stream = CommandStream::new(vec![]);
            stream.submit("{\"a\":1}").unwrap();
            stream.submit("{\"b\":2}").unwrap();
            assert_eq!(
                String::from_utf8(stream.writer.clone().unwrap()).unwrap(),
                "{\"a\":1}\n{\"b\":2}\n"
            );
        }

        #[test]
        fn refuses_commands_after_close() {
            let mut stream = CommandStream::new(vec![]);
            stream.close().unwrap();
            assert_matches!(stream.submit("{}"), Err(Error::Transport(_)));
        }
    }

    mod device_monitor {
        use super::*;

        #[test]
        fn returns_the_first_matching_notification() {
            let (sender, receiver) = unbounded();
            sender
                .send(DeviceNotification::Added(device_info(3, "other", 0)))
                .unwrap();
            sender
                .send(DeviceNotification::Added(device_info(4, "wanted", 0)))
                .unwrap();
            let monitor = DeviceMonitor::new(receiver);
            let found = monitor.wait_for(Duration::from_millis(100), |notification| {
                match notification {
                    DeviceNotification::Added(info) if info.name == "wanted" => Some(info.device_id),
                    _ => None,
                }
            });
            assert_eq!(found, Some(4));
        }

        #[test]
        fn gives_up_after_the_timeout() {
            let (_sender, receiver) = unbounded::<DeviceNotification>();
            let monitor = DeviceMonitor::new(receiver);
            let start = Instant::now();
            assert!(!monitor.wait_for_removal(1, Duration::from_millis(30)));
            assert!(start.elapsed() >= Duration::from_millis(30));
        }

        #[test]
        fn sees_notifications_sent_from_other_threads() {
            let (sender, receiver) = unbounded();
            let monitor = DeviceMonitor::new(receiver);
            let thread = std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(10));
                sender.send(DeviceNotification::Removed(9)).unwrap();
            });
            assert!(monitor.wait_for_removal(9, Duration::from_secs(2)));
            thread.join().unwrap();
        }
    }

    mod display_association {
        use super::*;

        #[test]
        fn removes_the_association_when_dropped() {
            let associations = Arc::new(FakeAssociations::default());
            {
                let _association =
                    DisplayAssociation::new(associations.clone(), "usb:1", "local:0").unwrap();
            }
            assert_eq!(
                *associations.log.lock().unwrap(),
                vec!["associate usb:1 local:0", "remove usb:1"]
            );
        }
    }

    mod scoped_rotation {
        use super::*;

        #[test]
        fn restores_the_previous_rotation() {
            let mut display = FakeDisplay::new();
            {
                let scoped =
                    ScopedRotation::new(&mut display, Rotation::Rotation90, Duration::from_secs(1))
                        .unwrap();
                assert_eq!(scoped.display().rotation(), Rotation::Rotation90);
            }
            assert_eq!(display.rotation, Rotation::Rotation0);
            assert_eq!(display.history, vec![Rotation::Rotation90, Rotation::Rotation0]);
        }

        #[test]
        fn fails_when_the_display_does_not_settle() {
            let mut display = FakeDisplay::new();
            display.settled = false;
            assert_matches!(
                ScopedRotation::new(&mut display, Rotation::Rotation180, Duration::from_millis(5)),
                Err(Error::DisplayNotIdle(_))
            );
        }

        #[test]
        fn restores_the_rotation_when_the_display_does_not_settle() {
            let mut display = FakeDisplay::new();
            display.settled = false;
            let result =
                ScopedRotation::new(&mut display, Rotation::Rotation180, Duration::from_millis(5));
            assert!(result.is_err());
            drop(result);
            assert_eq!(display.rotation, Rotation::Rotation0);
            assert_eq!(
                display.history,
                vec![Rotation::Rotation180, Rotation::Rotation0]
            );
        }
    }
}
