use crate::descriptor::CapabilityDescriptor;
use crate::error::Result;
use crate::evdev::*;
use crate::injector::{EventInjector, EventSink};
use crate::slots::{ProtocolError, ToolType};
use crate::touch::stylus_button;
use crate::verifier::{ExpectedMotion, MotionAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PenState {
    Away,
    Hovering,
    Touching,
}

impl PenState {
    fn name(self) -> &'static str {
        match self {
            PenState::Away => "away",
            PenState::Hovering => "hovering",
            PenState::Touching => "touching",
        }
    }
}

/// Drives a single-touch pen tablet (`ABS_X`/`ABS_Y` with `BTN_TOOL_PEN`).
/// The pen enters proximity before it can touch down.
pub struct DrawingTablet<S: EventSink> {
    injector: EventInjector<S>,
    state: PenState,
    button_state: u32,
}

impl<S: EventSink> DrawingTablet<S> {
    pub fn new(descriptor: CapabilityDescriptor, sink: S) -> DrawingTablet<S> {
        DrawingTablet {
            injector: EventInjector::new(descriptor, sink),
            state: PenState::Away,
            button_state: 0,
        }
    }

    pub fn state(&self) -> PenState {
        self.state
    }

    pub fn sink(&self) -> &S {
        self.injector.sink()
    }

    pub fn into_sink(self) -> S {
        self.injector.into_sink()
    }

    fn require(&self, operation: &'static str, state: PenState) -> Result<()> {
        if self.state == state {
            Ok(())
        } else {
            Err(ProtocolError::PenState {
                operation,
                state: self.state.name(),
            }
            .into())
        }
    }

    fn expected(&self, action: MotionAction) -> ExpectedMotion {
        ExpectedMotion::new(action)
            .tool_type(ToolType::Pen)
            .buttons(self.button_state)
    }

    pub fn hover_enter(&mut self, position: Position) -> Result<ExpectedMotion> {
        self.require("enter proximity", PenState::Away)?;
        self.injector.set_button(BTN_TOOL_PEN, true)?;
        self.injector.set_position(position)?;
        self.injector.sync()?;
        self.state = PenState::Hovering;
        Ok(self.expected(MotionAction::HoverEnter))
    }

    pub fn hover_move(&mut self, position: Position) -> Result<ExpectedMotion> {
        self.require("hover", PenState::Hovering)?;
        self.injector.set_position(position)?;
        self.injector.sync()?;
        Ok(self.expected(MotionAction::HoverMove))
    }

    pub fn hover_exit(&mut self) -> Result<ExpectedMotion> {
        self.require("leave proximity", PenState::Hovering)?;
        self.injector.set_button(BTN_TOOL_PEN, false)?;
        self.injector.sync()?;
        self.state = PenState::Away;
        Ok(self.expected(MotionAction::HoverExit))
    }

    pub fn down(&mut self, position: Position, pressure: i32) -> Result<ExpectedMotion> {
        self.require("touch down", PenState::Hovering)?;
        self.injector.set_position(position)?;
        self.injector.set_pressure(pressure)?;
        self.injector.set_button(BTN_TOUCH, true)?;
        self.injector.sync()?;
        self.state = PenState::Touching;
        Ok(self.expected(MotionAction::Down))
    }

    pub fn move_to(&mut self, position: Position) -> Result<ExpectedMotion> {
        self.require("move", PenState::Touching)?;
        self.injector.set_position(position)?;
        self.injector.sync()?;
        Ok(self.expected(MotionAction::Move))
    }

    /// Lifts the pen back into hover.
    pub fn up(&mut self) -> Result<ExpectedMotion> {
        self.require("lift", PenState::Touching)?;
        self.injector.set_pressure(0)?;
        self.injector.set_button(BTN_TOUCH, false)?;
        self.injector.sync()?;
        self.state = PenState::Hovering;
        Ok(self.expected(MotionAction::Up))
    }

    pub fn press_button(&mut self, code: u16) -> Result<ExpectedMotion> {
        self.injector.set_button(code, true)?;
        self.injector.sync()?;
        let pressed = stylus_button(code).unwrap_or(0);
        self.button_state |= pressed;
        Ok(self
            .expected(MotionAction::ButtonPress)
            .action_button(pressed))
    }

    pub fn release_button(&mut self, code: u16) -> Result<ExpectedMotion> {
        self.injector.set_button(code, false)?;
        self.injector.sync()?;
        let released = stylus_button(code).unwrap_or(0);
        self.button_state &= !released;
        Ok(self
            .expected(MotionAction::ButtonRelease)
            .action_button(released))
    }
}
