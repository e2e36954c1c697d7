//! Frame clock utilities for frame-accurate timelines.
//!
//! Output frame rates are kept as exact rationals so NTSC rates such as
//! `30000/1001` never accumulate floating point drift across a long
//! timeline. Durations are snapped to whole output frames before they are
//! handed to the encoder.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// An exact output frame rate (`num / den` frames per second).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FrameRate {
    num: u32,
    den: u32,
}

impl FrameRate {
    pub const FPS_25: FrameRate = FrameRate { num: 25, den: 1 };
    pub const FPS_30: FrameRate = FrameRate { num: 30, den: 1 };
    pub const NTSC_30: FrameRate = FrameRate {
        num: 30000,
        den: 1001,
    };

    /// Create a frame rate; returns `None` for a zero numerator or denominator.
    pub fn new(num: u32, den: u32) -> Option<Self> {
        if num == 0 || den == 0 {
            return None;
        }
        let g = gcd(num, den);
        Some(Self {
            num: num / g,
            den: den / g,
        })
    }

    pub fn num(&self) -> u32 {
        self.num
    }

    pub fn den(&self) -> u32 {
        self.den
    }

    /// Frames per second as a float.
    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// Duration of one frame in seconds.
    pub fn frame_secs(&self) -> f64 {
        self.den as f64 / self.num as f64
    }

    /// Nearest whole number of frames covering `secs`.
    pub fn frames_in(&self, secs: f64) -> u64 {
        (secs.max(0.0) * self.as_f64()).round() as u64
    }

    /// Exact duration of `frames` frames, in seconds.
    pub fn secs_for_frames(&self, frames: u64) -> f64 {
        frames as f64 * self.den as f64 / self.num as f64
    }

    /// Group-of-pictures length covering roughly two seconds.
    pub fn two_second_gop(&self) -> u32 {
        ((2.0 * self.as_f64()).round() as u32).max(1)
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::FPS_30
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

/// Error returned when a frame rate string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid frame rate: {0:?}")]
pub struct FrameRateParseError(pub String);

impl FromStr for FrameRate {
    type Err = FrameRateParseError;

    /// Accepts `30`, `29.97`, `23.976` and `30000/1001` forms.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || FrameRateParseError(s.to_string());
        let trimmed = s.trim();

        if let Some((num, den)) = trimmed.split_once('/') {
            let num = num.trim().parse::<u32>().map_err(|_| err())?;
            let den = den.trim().parse::<u32>().map_err(|_| err())?;
            return FrameRate::new(num, den).ok_or_else(err);
        }

        if let Ok(whole) = trimmed.parse::<u32>() {
            return FrameRate::new(whole, 1).ok_or_else(err);
        }

        let value = trimmed.parse::<f64>().map_err(|_| err())?;
        if !value.is_finite() || value <= 0.0 || value > 1000.0 {
            return Err(err());
        }

        // Common broadcast rates are 1000/1001 multiples of an integer.
        let ntsc_base = (value * 1001.0 / 1000.0).round();
        let is_whole = (value - value.round()).abs() < 1e-9;
        if !is_whole && (ntsc_base * 1000.0 / 1001.0 - value).abs() < 0.005 {
            return FrameRate::new(ntsc_base as u32 * 1000, 1001).ok_or_else(err);
        }

        FrameRate::new((value * 1000.0).round() as u32, 1000).ok_or_else(err)
    }
}

impl TryFrom<String> for FrameRate {
    type Error = FrameRateParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FrameRate> for String {
    fn from(value: FrameRate) -> Self {
        value.to_string()
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}
