use crate::error::{Error, Result};

custom_derive! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, IterVariants(RotationVariants))]
    pub enum Rotation {
        Rotation0,
        Rotation90,
        Rotation180,
        Rotation270,
    }
}

impl Rotation {
    pub fn degrees(self) -> u32 {
        match self {
            Rotation::Rotation0 => 0,
            Rotation::Rotation90 => 90,
            Rotation::Rotation180 => 180,
            Rotation::Rotation270 => 270,
        }
    }

    pub fn from_degrees(degrees: u32) -> Option<Rotation> {
        Rotation::iter_variants().find(|rotation| rotation.degrees() == degrees)
    }

    pub fn is_sideways(self) -> bool {
        self == Rotation::Rotation90 || self == Rotation::Rotation270
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Point {
        Point { x, y }
    }

    pub fn approx_eq(&self, other: &Point, epsilon: f32) -> bool {
        (self.x - other.x).abs() <= epsilon && (self.y - other.y).abs() <= epsilon
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub fn rotated(self, rotation: Rotation) -> Size {
        if rotation.is_sideways() {
            Size {
                width: self.height,
                height: self.width,
            }
        } else {
            self
        }
    }

    fn contains(&self, point: Point) -> bool {
        point.x >= 0.0
            && point.x < self.width as f32
            && point.y >= 0.0
            && point.y < self.height as f32
    }
}

/// The four raw corners, clockwise from the origin.
pub fn corners(size: Size) -> [Point; 4] {
    let right = (size.width - 1) as f32;
    let bottom = (size.height - 1) as f32;
    [
        Point::new(0.0, 0.0),
        Point::new(right, 0.0),
        Point::new(right, bottom),
        Point::new(0.0, bottom),
    ]
}

/// Where a raw device point is expected to show up on a display in a given
/// rotation.
///
/// The device space stays fixed to the panel. In the sideways rotations the
/// raw space is stretched by `height / width` onto the rotated logical
/// display, so part of it ends up beyond the visible area. Such points map
/// to `None`: they must not produce an event at all and are never clamped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    device: Size,
    display: Size,
}

impl Transform {
    pub fn new(device: Size, display: Size) -> Transform {
        Transform { device, display }
    }

    /// For devices fitted to the display they are associated with.
    pub fn fitted(size: Size) -> Transform {
        Transform::new(size, size)
    }

    pub fn apply(&self, rotation: Rotation, raw: Point) -> Option<Point> {
        let width = self.display.width as f32;
        let height = self.display.height as f32;
        let natural = Point {
            x: raw.x * width / self.device.width as f32,
            y: raw.y * height / self.device.height as f32,
        };
        let flipped = Point {
            x: width - 1.0 - natural.x,
            y: height - 1.0 - natural.y,
        };
        let scaled = |point: Point| Point::new(point.x * height / width, point.y * height / width);
        let point = match rotation {
            Rotation::Rotation0 => natural,
            Rotation::Rotation90 => scaled(natural),
            Rotation::Rotation180 => flipped,
            Rotation::Rotation270 => scaled(flipped),
        };
        if self.display.rotated(rotation).contains(point) {
            Some(point)
        } else {
            None
        }
    }

    pub fn expect_visible(&self, rotation: Rotation, raw: Point) -> Result<Point> {
        self.apply(rotation, raw).ok_or_else(|| {
            Error::TransformDomain(format!(
                "{:?} is off the surface in {:?}, no event will be dispatched",
                raw, rotation
            ))
        })
    }

    pub fn expect_hidden(&self, rotation: Rotation, raw: Point) -> Result<()> {
        match self.apply(rotation, raw) {
            None => Ok(()),
            Some(point) => Err(Error::TransformDomain(format!(
                "{:?} maps to {:?} in {:?}, expected it to be off the surface",
                raw, point, rotation
            ))),
        }
    }
}
