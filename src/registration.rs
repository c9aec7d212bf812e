//! The JSON commands understood by the host `uinput` tool.

use crate::descriptor::{AbsInfo, Capability, CapabilityDescriptor};
use crate::error::Result;
use crate::evdev::RawEvent;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize, PartialEq)]
pub struct ConfigurationItem {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub data: Vec<u16>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct AbsInfoItem {
    pub code: u16,
    pub info: AbsInfo,
}

#[derive(Debug, Serialize)]
pub struct RegisterCommand<'a> {
    pub id: u32,
    pub command: &'static str,
    pub name: &'a str,
    pub vid: u16,
    pub pid: u16,
    pub bus: &'a str,
    pub port: &'a str,
    pub configuration: Vec<ConfigurationItem>,
    pub abs_info: Vec<AbsInfoItem>,
}

#[derive(Debug, Serialize)]
pub struct InjectCommand {
    pub id: u32,
    pub command: &'static str,
    pub events: Vec<i32>,
}

#[derive(Debug, Serialize)]
pub struct DelayCommand {
    pub id: u32,
    pub command: &'static str,
    pub duration: u64,
}

fn configuration_kind(capability: Capability) -> (&'static str, u16) {
    match capability {
        Capability::EvBit(code) => ("UI_SET_EVBIT", code),
        Capability::KeyBit(code) => ("UI_SET_KEYBIT", code),
        Capability::AbsBit(code) => ("UI_SET_ABSBIT", code),
        Capability::PropBit(code) => ("UI_SET_PROPBIT", code),
    }
}

/// Groups the capabilities into one configuration entry per ioctl.
fn configuration(descriptor: &CapabilityDescriptor) -> Vec<ConfigurationItem> {
    let mut result: Vec<ConfigurationItem> = vec![];
    for capability in descriptor.capabilities() {
        let (kind, code) = configuration_kind(*capability);
        match result.last_mut() {
            Some(item) if item.kind == kind => item.data.push(code),
            _ => result.push(ConfigurationItem {
                kind,
                data: vec![code],
            }),
        }
    }
    result
}

pub fn register_command(descriptor: &CapabilityDescriptor) -> Result<RegisterCommand> {
    descriptor.validate()?;
    Ok(RegisterCommand {
        id: descriptor.id,
        command: "register",
        name: &descriptor.name,
        vid: descriptor.vendor_id,
        pid: descriptor.product_id,
        bus: &descriptor.bus,
        port: &descriptor.port,
        configuration: configuration(descriptor),
        abs_info: descriptor
            .abs_axes()
            .map(|(code, info)| AbsInfoItem { code, info: *info })
            .collect(),
    })
}

pub fn encode_register(descriptor: &CapabilityDescriptor) -> Result<String> {
    Ok(serde_json::to_string(&register_command(descriptor)?)?)
}

/// One batch, always terminated by a `SYN_REPORT`.
pub fn encode_inject(id: u32, events: &[RawEvent]) -> Result<String> {
    let mut flattened: Vec<i32> = events.iter().flat_map(|event| event.triple().to_vec()).collect();
    flattened.extend_from_slice(&RawEvent::syn_report().triple());
    Ok(serde_json::to_string(&InjectCommand {
        id,
        command: "inject",
        events: flattened,
    })?)
}

pub fn encode_delay(id: u32, duration: Duration) -> Result<String> {
    Ok(serde_json::to_string(&DelayCommand {
        id,
        command: "delay",
        duration: duration.as_millis() as u64,
    })?)
}

/// The events of an inject command, without the terminating report.
pub fn decode_inject(command: &str) -> Result<Option<Vec<RawEvent>>> {
    let value: serde_json::Value = serde_json::from_str(command)?;
    if value["command"] != "inject" {
        return Ok(None);
    }
    let numbers: Vec<i32> = serde_json::from_value(value["events"].clone())?;
    let mut events: Vec<RawEvent> = numbers
        .chunks(3)
        .filter(|triple| triple.len() == 3)
        .map(|triple| RawEvent::new(triple[0] as u16, triple[1] as u16, triple[2]))
        .collect();
    if events.last().map_or(false, RawEvent::is_syn_report) {
        events.pop();
    }
    Ok(Some(events))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::descriptor::{DescriptorError, Template};
    use crate::error::Error;
    use crate::evdev::*;
    use ::evdev_rs::enums::EV_ABS;
    use assert_matches::assert_matches;
    use serde_json::{json, Value};

    fn parse(command: &str) -> Value {
        serde_json::from_str(command).unwrap()
    }

    mod encode_register {
        use super::*;

        #[test]
        fn produces_the_host_command_format() {
            let descriptor = CapabilityDescriptor::from_template(Template::Touchscreen)
                .fit_to_surface(480, 800)
                .unwrap();
            let command = parse(&encode_register(&descriptor).unwrap());
            assert_eq!(command["command"], "register");
            assert_eq!(command["name"], "Virtual Touchscreen");
            assert_eq!(command["vid"], 0x18d1);
            assert_eq!(command["pid"], 0xabcd);
            assert_eq!(command["bus"], "usb");
            assert_eq!(
                command["configuration"][0],
                json!({"type": "UI_SET_EVBIT", "data": [1, 3]})
            );
            assert_eq!(
                command["configuration"][1],
                json!({"type": "UI_SET_KEYBIT", "data": [0x145, 0x14a]})
            );
            assert_eq!(command["configuration"][3]["type"], "UI_SET_PROPBIT");
        }

        #[test]
        fn includes_the_fitted_axis_ranges() {
            let descriptor = CapabilityDescriptor::from_template(Template::Touchscreen)
                .fit_to_surface(480, 800)
                .unwrap();
            let command = parse(&encode_register(&descriptor).unwrap());
            let abs_info = command["abs_info"].as_array().unwrap();
            let x = abs_info
                .iter()
                .find(|item| item["code"] == ABS_MT_POSITION_X)
                .unwrap();
            assert_eq!(
                x["info"],
                json!({"value": 0, "minimum": 0, "maximum": 479, "fuzz": 0, "flat": 0, "resolution": 0})
            );
        }

        #[test]
        fn rejects_unfitted_descriptors() {
            let descriptor = CapabilityDescriptor::from_template(Template::Touchscreen);
            assert_matches!(
                encode_register(&descriptor),
                Err(Error::Descriptor(DescriptorError::AxisMaximumUnset(_)))
            );
        }
    }

    mod encode_inject {
        use super::*;

        #[test]
        fn flattens_the_triples_and_appends_a_report() {
            let command = parse(
                &encode_inject(
                    3,
                    &[
                        RawEvent::abs(EV_ABS::ABS_MT_SLOT, 0),
                        RawEvent::abs(EV_ABS::ABS_MT_TRACKING_ID, 7),
                    ],
                )
                .unwrap(),
            );
            assert_eq!(
                command,
                json!({"id": 3, "command": "inject", "events": [3, 0x2f, 0, 3, 0x39, 7, 0, 0, 0]})
            );
        }

        #[test]
        fn sends_a_bare_report_for_an_empty_batch() {
            let command = parse(&encode_inject(1, &[]).unwrap());
            assert_eq!(command["events"], json!([0, 0, 0]));
        }
    }

    #[test]
    fn encode_delay_uses_milliseconds() {
        let command = parse(&encode_delay(2, Duration::from_millis(1500)).unwrap());
        assert_eq!(command, json!({"id": 2, "command": "delay", "duration": 1500}));
    }

    mod decode_inject {
        use super::*;

        #[test]
        fn reverses_encode_inject() {
            let events = vec![RawEvent::abs(EV_ABS::ABS_MT_POSITION_X, 10)];
            let decoded = decode_inject(&encode_inject(1, &events).unwrap()).unwrap();
            assert_eq!(decoded, Some(events));
        }

        #[test]
        fn skips_other_commands() {
            let command = encode_delay(1, Duration::from_millis(5)).unwrap();
            assert_eq!(decode_inject(&command).unwrap(), None);
        }
    }
}
