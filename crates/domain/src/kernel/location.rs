//! Grid coordinates.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};

/// A validated point on the delivery grid.
///
/// Both coordinates lie in `[Location::MIN, Location::MAX]`. The fields are
/// private and every constructor validates, so a `Location` outside the grid
/// cannot be observed. Deserialization goes through the same check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawLocation", into = "RawLocation")]
pub struct Location {
    x: i32,
    y: i32,
}

#[derive(Serialize, Deserialize)]
struct RawLocation {
    x: i32,
    y: i32,
}

impl Location {
    /// Smallest valid coordinate.
    pub const MIN: i32 = 1;
    /// Largest valid coordinate.
    pub const MAX: i32 = 10;

    /// Creates a location, failing with `OutOfRange` when either coordinate
    /// is off the grid.
    pub fn new(x: i32, y: i32) -> Result<Self> {
        check_coordinate("x", x)?;
        check_coordinate("y", y)?;
        Ok(Self { x, y })
    }

    /// Samples a location uniformly from the grid.
    pub fn random() -> Self {
        Self::random_with(&mut rand::thread_rng())
    }

    /// Samples a location using the given generator.
    pub fn random_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            x: rng.gen_range(Self::MIN..=Self::MAX),
            y: rng.gen_range(Self::MIN..=Self::MAX),
        }
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    /// Manhattan distance to `other`.
    pub fn distance_to(&self, other: &Location) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Returns the neighbouring cell one unit closer to `target`.
    ///
    /// Moves along x until it matches, then along y. Returns `self` when
    /// already at the target. The result stays on the grid because it lies
    /// between two valid points.
    pub fn step_towards(&self, target: &Location) -> Location {
        if self.x != target.x {
            Location {
                x: self.x + (target.x - self.x).signum(),
                y: self.y,
            }
        } else {
            Location {
                x: self.x,
                y: self.y + (target.y - self.y).signum(),
            }
        }
    }
}

fn check_coordinate(field: &'static str, value: i32) -> Result<()> {
    if (Location::MIN..=Location::MAX).contains(&value) {
        Ok(())
    } else {
        Err(DomainError::OutOfRange {
            field,
            value: i64::from(value),
            min: i64::from(Location::MIN),
            max: i64::from(Location::MAX),
        })
    }
}

impl TryFrom<RawLocation> for Location {
    type Error = DomainError;

    fn try_from(raw: RawLocation) -> Result<Self> {
        Location::new(raw.x, raw.y)
    }
}

impl From<Location> for RawLocation {
    fn from(location: Location) -> Self {
        RawLocation {
            x: location.x,
            y: location.y,
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}
