#[macro_use]
extern crate custom_derive;
#[macro_use]
extern crate enum_derive;

pub mod cli;
pub mod config;
pub mod descriptor;
pub mod device;
pub mod error;
pub mod evdev;
pub mod host;
pub mod injector;
pub mod keyboard;
pub mod logger;
pub mod registration;
pub mod slots;
pub mod tablet;
pub mod touch;
pub mod transform;
pub mod verifier;
