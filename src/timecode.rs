//! Timecode, frame and seconds conversions.
//!
//! A timecode is an `HH:MM:SS:FF` string that only means something next to a
//! frame rate. Two rates are involved:
//!
//! - the **exact** rate (`num/den`), used for seconds. `23.976` is stored as
//!   `24000/1001`, the way ffprobe reports it.
//! - the **nominal** rate, the exact rate rounded to the nearest whole frame.
//!   Timecode counts frames at the nominal rate, so `23.976` timecode runs
//!   `00` to `23` in the frames field.
//!
//! Timecode is always non-drop-frame. Hours are not wrapped at 24, which keeps
//! [`frames_to_timecode`] and [`timecode_to_frames`] exact inverses for every
//! non-negative frame count.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimeError {
    #[error("malformed timecode '{0}': expected HH:MM:SS:FF")]
    MalformedTimecode(String),
    #[error("invalid frame count {0}: frames must be non-negative")]
    InvalidFrameCount(i64),
    #[error("invalid frame rate '{0}'")]
    InvalidFrameRate(String),
}

/// How close a decimal rate must be to `N * 1000 / 1001` to be read as NTSC.
const NTSC_TOLERANCE: f64 = 0.001;

/// A positive rational frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRate {
    num: u32,
    den: u32,
}

impl FrameRate {
    pub fn new(num: u32, den: u32) -> Result<Self, TimeError> {
        if num == 0 || den == 0 {
            return Err(TimeError::InvalidFrameRate(format!("{num}/{den}")));
        }
        let g = gcd(num, den);
        Ok(Self {
            num: num / g,
            den: den / g,
        })
    }

    /// Build a rate from a decimal value.
    ///
    /// Whole numbers map to `N/1`, NTSC-style decimals (`23.976`, `29.97`,
    /// `59.94`, ...) map to `N*1000/1001`, anything else is kept to three
    /// decimal places.
    pub fn from_float(fps: f64) -> Result<Self, TimeError> {
        if !fps.is_finite() || fps <= 0.0 || fps > f64::from(u32::MAX / 1000) {
            return Err(TimeError::InvalidFrameRate(fps.to_string()));
        }
        let nominal = fps.round();
        if (fps - nominal).abs() < 1e-9 {
            return Self::new(nominal as u32, 1);
        }
        let ntsc = nominal * 1000.0 / 1001.0;
        if (fps - ntsc).abs() < NTSC_TOLERANCE {
            return Self::new(nominal as u32 * 1000, 1001);
        }
        Self::new((fps * 1000.0).round() as u32, 1000)
    }

    pub fn numerator(self) -> u32 {
        self.num
    }

    pub fn denominator(self) -> u32 {
        self.den
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Frames per timecode second.
    pub fn nominal(self) -> u64 {
        (self.as_f64().round() as u64).max(1)
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        Self { num: 24, den: 1 }
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

impl FromStr for FrameRate {
    type Err = TimeError;

    /// Accepts `24`, `23.976` and `24000/1001`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || TimeError::InvalidFrameRate(s.to_string());
        match s.split_once('/') {
            Some((num, den)) => {
                let num = num.trim().parse::<u32>().map_err(|_| invalid())?;
                let den = den.trim().parse::<u32>().map_err(|_| invalid())?;
                Self::new(num, den).map_err(|_| invalid())
            }
            None => {
                let fps = s.parse::<f64>().map_err(|_| invalid())?;
                Self::from_float(fps).map_err(|_| invalid())
            }
        }
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// A parsed `HH:MM:SS:FF` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timecode {
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
    pub frames: u64,
}

impl Timecode {
    /// Parse and range-check a timecode against `rate`.
    ///
    /// Minutes and seconds must be below 60 and frames below the nominal rate.
    pub fn parse(s: &str, rate: FrameRate) -> Result<Self, TimeError> {
        let malformed = || TimeError::MalformedTimecode(s.to_string());
        let fields: Vec<&str> = s.trim().split(':').collect();
        if fields.len() != 4 {
            return Err(malformed());
        }
        let mut nums = [0u64; 4];
        for (slot, field) in nums.iter_mut().zip(&fields) {
            if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
                return Err(malformed());
            }
            *slot = field.parse().map_err(|_| malformed())?;
        }
        let [hours, minutes, seconds, frames] = nums;
        if minutes >= 60 || seconds >= 60 || frames >= rate.nominal() {
            return Err(malformed());
        }
        Ok(Self {
            hours,
            minutes,
            seconds,
            frames,
        })
    }

    pub fn from_frames(frames: u64, rate: FrameRate) -> Self {
        let per_second = rate.nominal();
        let total_seconds = frames / per_second;
        Self {
            hours: total_seconds / 3600,
            minutes: (total_seconds / 60) % 60,
            seconds: total_seconds % 60,
            frames: frames % per_second,
        }
    }

    /// Absolute frame number. Fails when the count does not fit in `u64`.
    pub fn to_frames(self, rate: FrameRate) -> Result<u64, TimeError> {
        self.hours
            .checked_mul(3600)
            .and_then(|s| s.checked_add(self.minutes * 60 + self.seconds))
            .and_then(|s| s.checked_mul(rate.nominal()))
            .and_then(|f| f.checked_add(self.frames))
            .ok_or_else(|| TimeError::MalformedTimecode(self.to_string()))
    }
}

impl fmt::Display for Timecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}:{:02}",
            self.hours, self.minutes, self.seconds, self.frames
        )
    }
}

/// Convert an `HH:MM:SS:FF` timecode to an absolute frame number.
pub fn timecode_to_frames(timecode: &str, fps: FrameRate) -> Result<u64, TimeError> {
    Timecode::parse(timecode, fps)?.to_frames(fps)
}

/// Convert a frame number to an `HH:MM:SS:FF` timecode.
pub fn frames_to_timecode(frames: i64, fps: FrameRate) -> Result<String, TimeError> {
    let frames = u64::try_from(frames).map_err(|_| TimeError::InvalidFrameCount(frames))?;
    Ok(Timecode::from_frames(frames, fps).to_string())
}

/// Convert a frame number to seconds at the exact rate.
pub fn frames_to_seconds(frames: u64, fps: FrameRate) -> f64 {
    frames as f64 * f64::from(fps.den) / f64::from(fps.num)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fps(s: &str) -> FrameRate {
        s.parse().unwrap()
    }

    // =========================================================================
    // FrameRate
    // =========================================================================

    #[test]
    fn frame_rate_parses_integers_decimals_and_ratios() {
        assert_eq!(fps("24"), FrameRate::new(24, 1).unwrap());
        assert_eq!(fps("25.0"), FrameRate::new(25, 1).unwrap());
        assert_eq!(fps("23.976"), FrameRate::new(24000, 1001).unwrap());
        assert_eq!(fps("29.97"), FrameRate::new(30000, 1001).unwrap());
        assert_eq!(fps("59.94"), FrameRate::new(60000, 1001).unwrap());
        assert_eq!(fps("24000/1001"), FrameRate::new(24000, 1001).unwrap());
        assert_eq!(fps("12.5"), FrameRate::new(25, 2).unwrap());
    }

    #[test]
    fn frame_rate_reduces_ratios() {
        let rate = FrameRate::new(50, 2).unwrap();
        assert_eq!(rate.numerator(), 25);
        assert_eq!(rate.denominator(), 1);
        assert_eq!(rate.to_string(), "25");
        assert_eq!(fps("24000/1001").to_string(), "24000/1001");
    }

    #[test]
    fn frame_rate_rejects_non_positive() {
        assert!(matches!(
            FrameRate::new(0, 1),
            Err(TimeError::InvalidFrameRate(_))
        ));
        assert!(matches!(
            FrameRate::new(24, 0),
            Err(TimeError::InvalidFrameRate(_))
        ));
        assert!("0".parse::<FrameRate>().is_err());
        assert!("-24".parse::<FrameRate>().is_err());
        assert!("abc".parse::<FrameRate>().is_err());
        assert!("24/0".parse::<FrameRate>().is_err());
        assert!(FrameRate::from_float(f64::NAN).is_err());
    }

    #[test]
    fn nominal_rate_rounds_ntsc() {
        assert_eq!(fps("23.976").nominal(), 24);
        assert_eq!(fps("29.97").nominal(), 30);
        assert_eq!(fps("12.5").nominal(), 13);
    }

    // =========================================================================
    // timecode_to_frames / frames_to_timecode
    // =========================================================================

    #[test]
    fn timecode_to_frames_at_24() {
        assert_eq!(timecode_to_frames("00:00:00:00", fps("24")).unwrap(), 0);
        assert_eq!(timecode_to_frames("00:00:01:00", fps("24")).unwrap(), 24);
        assert_eq!(timecode_to_frames("01:00:00:00", fps("24")).unwrap(), 86_400);
        assert_eq!(timecode_to_frames("00:00:41:17", fps("24")).unwrap(), 1001);
    }

    #[test]
    fn frames_to_timecode_at_24() {
        assert_eq!(frames_to_timecode(0, fps("24")).unwrap(), "00:00:00:00");
        assert_eq!(frames_to_timecode(1001, fps("24")).unwrap(), "00:00:41:17");
        assert_eq!(frames_to_timecode(86_400, fps("24")).unwrap(), "01:00:00:00");
    }

    #[test]
    fn frames_to_timecode_does_not_wrap_hours() {
        let frames = 25 * 3600 * 24;
        assert_eq!(frames_to_timecode(frames, fps("24")).unwrap(), "25:00:00:00");
    }

    #[test]
    fn frames_to_timecode_rejects_negative() {
        assert_eq!(
            frames_to_timecode(-1, fps("24")),
            Err(TimeError::InvalidFrameCount(-1))
        );
    }

    #[test]
    fn timecode_to_frames_rejects_overflowing_hours() {
        let tc = "100000000000000000:00:00:00";
        assert_eq!(
            timecode_to_frames(tc, fps("24")),
            Err(TimeError::MalformedTimecode(tc.to_string()))
        );
        assert!(timecode_to_frames("18446744073709551615:00:00:00", fps("24")).is_err());
    }

    #[test]
    fn ntsc_timecode_counts_nominal_frames() {
        assert_eq!(frames_to_timecode(24, fps("23.976")).unwrap(), "00:00:01:00");
        assert_eq!(timecode_to_frames("00:00:00:23", fps("23.976")).unwrap(), 23);
    }

    #[test]
    fn malformed_timecodes_are_rejected() {
        let rate = fps("24");
        for bad in [
            "",
            "01:00:00",
            "01:00:00:00:00",
            "01:00:00;00",
            "aa:00:00:00",
            "01::00:00",
            "-1:00:00:00",
            "01:60:00:00",
            "01:00:60:00",
            "01:00:00:24",
        ] {
            assert!(
                matches!(
                    timecode_to_frames(bad, rate),
                    Err(TimeError::MalformedTimecode(_))
                ),
                "expected '{bad}' to be malformed"
            );
        }
    }

    #[test]
    fn round_trip_holds_across_rates() {
        for rate in ["24", "25", "23.976", "29.97", "60", "12.5", "1"] {
            let rate = fps(rate);
            for f in (0..200_000i64).step_by(997).chain([0, 1, 23, 24, 86_399]) {
                let tc = frames_to_timecode(f, rate).unwrap();
                assert_eq!(
                    timecode_to_frames(&tc, rate).unwrap(),
                    f as u64,
                    "round trip failed for {f} at {rate}"
                );
            }
        }
    }

    // =========================================================================
    // frames_to_seconds
    // =========================================================================

    #[test]
    fn frames_to_seconds_uses_exact_rate() {
        assert!((frames_to_seconds(48, fps("24")) - 2.0).abs() < 1e-12);
        assert!((frames_to_seconds(24_000, fps("23.976")) - 1001.0).abs() < 1e-9);
        assert_eq!(frames_to_seconds(0, fps("25")), 0.0);
    }
}
