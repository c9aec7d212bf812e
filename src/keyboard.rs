use crate::descriptor::CapabilityDescriptor;
use crate::error::Result;
use crate::injector::{EventInjector, EventSink};
use crate::verifier::KeyAction;

/// Presses and releases raw key codes. Codes are Linux key codes; mapping
/// them to layout-specific characters is left to the receiving side.
pub struct Keyboard<S: EventSink> {
    injector: EventInjector<S>,
}

impl<S: EventSink> Keyboard<S> {
    pub fn new(descriptor: CapabilityDescriptor, sink: S) -> Keyboard<S> {
        Keyboard {
            injector: EventInjector::new(descriptor, sink),
        }
    }

    pub fn sink(&self) -> &S {
        self.injector.sink()
    }

    pub fn into_sink(self) -> S {
        self.injector.into_sink()
    }

    fn send(&mut self, code: u16, pressed: bool) -> Result<()> {
        self.injector.set_button(code, pressed)?;
        self.injector.sync()
    }

    pub fn press(&mut self, code: u16) -> Result<KeyAction> {
        self.send(code, true)?;
        Ok(KeyAction::Down)
    }

    pub fn release(&mut self, code: u16) -> Result<KeyAction> {
        self.send(code, false)?;
        Ok(KeyAction::Up)
    }

    pub fn tap(&mut self, code: u16) -> Result<[KeyAction; 2]> {
        Ok([self.press(code)?, self.release(code)?])
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::descriptor::{DescriptorError, Template};
    use crate::error::Error;
    use crate::evdev::{RawEvent, EV_KEY_TYPE};
    use assert_matches::assert_matches;

    const KEY_A: u16 = 30;

    fn keyboard() -> Keyboard<Vec<Vec<RawEvent>>> {
        Keyboard::new(CapabilityDescriptor::from_template(Template::Keyboard), vec![])
    }

    #[test]
    fn tap_sends_a_press_and_a_release() {
        let mut keyboard = keyboard();
        assert_eq!(keyboard.tap(KEY_A).unwrap(), [KeyAction::Down, KeyAction::Up]);
        assert_eq!(
            keyboard.into_sink(),
            vec![
                vec![RawEvent::new(EV_KEY_TYPE, KEY_A, 1)],
                vec![RawEvent::new(EV_KEY_TYPE, KEY_A, 0)],
            ]
        );
    }

    #[test]
    fn rejects_undeclared_keys() {
        let mut keyboard = keyboard();
        assert_matches!(
            keyboard.press(0x110),
            Err(Error::Descriptor(DescriptorError::UndeclaredKey(0x110)))
        );
        assert!(keyboard.sink().is_empty());
    }
}
