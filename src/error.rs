use crate::descriptor::DescriptorError;
use crate::slots::ProtocolError;
use crate::verifier::ObservedEvent;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid device descriptor: {0}")]
    Descriptor(#[from] DescriptorError),

    #[error("device '{name}' was not observed within {timeout:?}")]
    DeviceNotObserved { name: String, timeout: Duration },

    #[error(
        "device '{name}' (id {device_id}) was observed with sources {actual:#x}, expected {expected:#x}"
    )]
    WrongCapabilities {
        name: String,
        device_id: i32,
        expected: u32,
        actual: u32,
    },

    #[error("transport: {0}")]
    Transport(String),

    #[error("transport io: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed gesture: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("no event received within {0:?}")]
    NoEvent(Duration),

    #[error("{what}: expected {expected}, got {actual}")]
    Mismatch {
        what: &'static str,
        expected: String,
        actual: String,
    },

    #[error("unexpected event: {0:?}")]
    UnexpectedEvent(Box<ObservedEvent>),

    #[error("transform: {0}")]
    TransformDomain(String),

    #[error("no such device: {0}")]
    NoSuchDevice(String),

    #[error("display did not become idle within {0:?}")]
    DisplayNotIdle(Duration),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("device file: {0}")]
    Config(#[from] toml::de::Error),

    #[error("{0}")]
    Cli(#[from] clap::Error),

    #[error("{0}")]
    Usage(String),
}

impl Error {
    pub fn mismatch(
        what: &'static str,
        expected: impl std::fmt::Debug,
        actual: impl std::fmt::Debug,
    ) -> Error {
        Error::Mismatch {
            what,
            expected: format!("{:?}", expected),
            actual: format!("{:?}", actual),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
