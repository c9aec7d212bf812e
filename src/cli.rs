use crate::config::DeviceFile;
use crate::descriptor::{CapabilityDescriptor, Template};
use crate::error::{Error, Result};
use crate::evdev::Position;
use crate::host::{CommandStream, Transport, UinputProcess};
use crate::injector::TransportSink;
use crate::keyboard::Keyboard;
use crate::logger;
use crate::registration::encode_register;
use crate::slots::ToolType;
use crate::tablet::DrawingTablet;
use crate::touch::TouchScreen;
use crate::transform::{Point, Rotation, Size, Transform};
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use log::LevelFilter;
use std::ffi::OsString;
use std::fmt::Display;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceSource {
    Template(Template),
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceArgs {
    pub source: DeviceSource,
    pub fit: Option<Size>,
    pub port: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Prints the registration command.
    Register(DeviceArgs),
    /// Prints where a raw point shows up on the display.
    Transform {
        display: Size,
        device: Option<Size>,
        rotation: Rotation,
        raw: Point,
    },
    /// Prints a command stream for the host tool: the registration followed
    /// by one tap per position (or per key for keyboards).
    Script {
        device: DeviceArgs,
        taps: Vec<Position>,
        keys: Vec<u16>,
        /// Streams into this host tool instead of printing.
        uinput: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Args {
    pub log_level: LevelFilter,
    pub command: Command,
}

fn device_args<'a, 'b>() -> Vec<Arg<'a, 'b>> {
    vec![
        Arg::with_name("template")
            .long("template")
            .value_name("TEMPLATE")
            .help("device template, one of touchscreen, stylus, drawingtablet, keyboard (default: touchscreen)")
            .takes_value(true),
        Arg::with_name("device-file")
            .long("device-file")
            .value_name("PATH")
            .help("reads the device description from a TOML file")
            .takes_value(true)
            .conflicts_with("template"),
        Arg::with_name("fit")
            .long("fit")
            .value_name("WIDTHxHEIGHT")
            .help("fits the position axes to a surface")
            .takes_value(true),
        Arg::with_name("port")
            .long("port")
            .value_name("PORT")
            .help("the port used to associate the device with a display")
            .takes_value(true),
    ]
}

pub fn app<'a, 'b>() -> App<'a, 'b> {
    App::new("touchscreen-harness")
        .version("0.1.0")
        .author("Sönke Hahn <soenkehahn@gmail.com>")
        .about("virtual touchscreens, styluses and keyboards for the host uinput tool")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .global_setting(AppSettings::AllowNegativeNumbers)
        .arg(
            Arg::with_name("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("error, warn, info, debug or trace (default: warn)")
                .takes_value(true)
                .global(true),
        )
        .subcommand(
            SubCommand::with_name("register")
                .about("prints the registration command for a device")
                .args(&device_args()),
        )
        .subcommand(
            SubCommand::with_name("transform")
                .about("prints where a raw point is dispatched on a rotated display")
                .arg(
                    Arg::with_name("fit")
                        .long("fit")
                        .value_name("WIDTHxHEIGHT")
                        .help("the natural display size")
                        .takes_value(true)
                        .required(true),
                )
                .arg(
                    Arg::with_name("device-size")
                        .long("device-size")
                        .value_name("WIDTHxHEIGHT")
                        .help("the raw coordinate space (default: the display size)")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("rotation")
                        .long("rotation")
                        .value_name("DEGREES")
                        .help("0, 90, 180 or 270 (default: 0)")
                        .takes_value(true),
                )
                .arg(Arg::with_name("x").required(true).index(1))
                .arg(Arg::with_name("y").required(true).index(2)),
        )
        .subcommand(
            SubCommand::with_name("script")
                .about("prints the commands for registering a device and tapping it")
                .args(&device_args())
                .arg(
                    Arg::with_name("tap")
                        .long("tap")
                        .value_name("X,Y")
                        .help("taps at a raw position, may be repeated")
                        .takes_value(true)
                        .multiple(true)
                        .number_of_values(1),
                )
                .arg(
                    Arg::with_name("key")
                        .long("key")
                        .value_name("CODE")
                        .help("taps a key, may be repeated")
                        .takes_value(true)
                        .multiple(true)
                        .number_of_values(1),
                )
                .arg(
                    Arg::with_name("uinput")
                        .long("uinput")
                        .value_name("PROGRAM")
                        .help("runs the host uinput tool and feeds it the commands")
                        .takes_value(true),
                ),
        )
}

pub fn parse_from<I, T>(args: I) -> Result<Args>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = app().get_matches_from_safe(args)?;
    let log_level = logger::parse_level(
        matches
            .subcommand()
            .1
            .and_then(|sub| sub.value_of("log-level"))
            .or_else(|| matches.value_of("log-level")),
    )
    .map_err(Error::Usage)?;
    let command = match matches.subcommand() {
        ("register", Some(sub)) => Command::Register(parse_device_args(sub)?),
        ("transform", Some(sub)) => Command::Transform {
            display: parse_size(sub.value_of("fit").unwrap_or_default())?,
            device: sub.value_of("device-size").map(parse_size).transpose()?,
            rotation: parse_rotation(sub.value_of("rotation"))?,
            raw: Point::new(
                parse_number(sub.value_of("x").unwrap_or_default())?,
                parse_number(sub.value_of("y").unwrap_or_default())?,
            ),
        },
        ("script", Some(sub)) => Command::Script {
            device: parse_device_args(sub)?,
            taps: sub
                .values_of("tap")
                .map(|values| values.map(parse_position).collect::<Result<Vec<_>>>())
                .transpose()?
                .unwrap_or_default(),
            keys: sub
                .values_of("key")
                .map(|values| values.map(parse_number::<u16>).collect::<Result<Vec<_>>>())
                .transpose()?
                .unwrap_or_default(),
            uinput: sub.value_of("uinput").map(str::to_string),
        },
        (name, _) => return Err(Error::Usage(format!("unknown command: {}", name))),
    };
    Ok(Args { log_level, command })
}

fn parse_device_args(matches: &ArgMatches) -> Result<DeviceArgs> {
    let source = match matches.value_of("device-file") {
        Some(path) => DeviceSource::File(PathBuf::from(path)),
        None => DeviceSource::Template(match matches.value_of("template") {
            None => Template::Touchscreen,
            Some(name) => Template::parse(name)?,
        }),
    };
    Ok(DeviceArgs {
        source,
        fit: matches.value_of("fit").map(parse_size).transpose()?,
        port: matches.value_of("port").map(str::to_string),
    })
}

fn parse_number<N>(input: &str) -> Result<N>
where
    N: FromStr,
    <N as FromStr>::Err: Display,
{
    input
        .trim()
        .parse()
        .map_err(|e| Error::Usage(format!("{}: {}", input, e)))
}

fn parse_size(input: &str) -> Result<Size> {
    let mut parts = input.splitn(2, 'x');
    match (parts.next(), parts.next()) {
        (Some(width), Some(height)) => Ok(Size {
            width: parse_number(width)?,
            height: parse_number(height)?,
        }),
        _ => Err(Error::Usage(format!(
            "expected WIDTHxHEIGHT, got: {}",
            input
        ))),
    }
}

fn parse_position(input: &str) -> Result<Position> {
    let mut parts = input.splitn(2, ',');
    match (parts.next(), parts.next()) {
        (Some(x), Some(y)) => Ok(Position {
            x: parse_number(x)?,
            y: parse_number(y)?,
        }),
        _ => Err(Error::Usage(format!("expected X,Y, got: {}", input))),
    }
}

fn parse_rotation(input: Option<&str>) -> Result<Rotation> {
    match input {
        None => Ok(Rotation::Rotation0),
        Some(degrees) => Rotation::from_degrees(parse_number(degrees)?).ok_or_else(|| {
            Error::Usage(format!(
                "unknown rotation: {}, possible values: {:?}",
                degrees,
                Rotation::iter_variants()
                    .map(Rotation::degrees)
                    .collect::<Vec<u32>>()
            ))
        }),
    }
}

pub fn load_descriptor(args: &DeviceArgs) -> Result<CapabilityDescriptor> {
    let mut descriptor = match &args.source {
        DeviceSource::Template(template) => CapabilityDescriptor::from_template(*template),
        DeviceSource::File(path) => DeviceFile::load(path)?.into_descriptor()?,
    };
    if let Some(size) = args.fit {
        descriptor = descriptor.fit_to_surface(size.width, size.height)?;
    }
    if let Some(port) = &args.port {
        descriptor.port = port.clone();
    }
    Ok(descriptor)
}

fn run_script<T: Transport>(
    descriptor: CapabilityDescriptor,
    taps: &[Position],
    keys: &[u16],
    mut transport: T,
) -> Result<()> {
    let has_surface = descriptor.is_multi_touch() || descriptor.surface_size().is_some();
    if has_surface && !keys.is_empty() {
        return Err(Error::Usage(format!(
            "'{}' takes taps, not keys",
            descriptor.name
        )));
    }
    transport.submit(&encode_register(&descriptor)?)?;
    let sink = TransportSink {
        id: descriptor.id,
        transport,
    };
    let mut sink = if descriptor.is_multi_touch() {
        let mut screen = TouchScreen::new(descriptor, sink);
        for position in taps {
            screen.pointer_down(0, ToolType::Finger, *position)?;
            screen.pointer_up(0)?;
        }
        screen.into_sink()
    } else if descriptor.surface_size().is_some() {
        let mut tablet = DrawingTablet::new(descriptor, sink);
        for position in taps {
            tablet.hover_enter(*position)?;
            tablet.down(*position, 1)?;
            tablet.up()?;
            tablet.hover_exit()?;
        }
        tablet.into_sink()
    } else {
        if !taps.is_empty() {
            return Err(Error::Usage(format!(
                "'{}' has no surface to tap",
                descriptor.name
            )));
        }
        let mut keyboard = Keyboard::new(descriptor, sink);
        for key in keys {
            keyboard.tap(*key)?;
        }
        keyboard.into_sink()
    };
    sink.transport.close()
}

pub fn run<W: Write>(command: Command, mut output: W) -> Result<()> {
    match command {
        Command::Register(device) => {
            let descriptor = load_descriptor(&device)?;
            writeln!(output, "{}", encode_register(&descriptor)?)?;
        }
        Command::Transform {
            display,
            device,
            rotation,
            raw,
        } => {
            let transform = Transform::new(device.unwrap_or(display), display);
            match transform.apply(rotation, raw) {
                Some(point) => writeln!(output, "{:.2},{:.2}", point.x, point.y)?,
                None => writeln!(output, "off-surface")?,
            }
        }
        Command::Script {
            device,
            taps,
            keys,
            uinput,
        } => {
            let descriptor = load_descriptor(&device)?;
            match uinput {
                None => run_script(descriptor, &taps, &keys, CommandStream::new(output))?,
                Some(program) => run_script(
                    descriptor,
                    &taps,
                    &keys,
                    UinputProcess::spawn(&program, &["-"])?,
                )?,
            }
        }
    }
    Ok(())
}
