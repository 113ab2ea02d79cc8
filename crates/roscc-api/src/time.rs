// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

use core::fmt;
use core::fmt::Display;
use core::result;
use core::str::FromStr;
use core::time::Duration;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;

const UNITS: [(char, u64); 5] =
    [('w', 604_800), ('d', 86_400), ('h', 3_600), ('m', 60), ('s', 1)];

/// A duration as RouterOS writes it.
///
/// Accepted forms are unit runs (`1w2d`, `30m`, `1h30m15s`), a clock
/// (`00:10:00`), a unit run followed by a clock (`1d02:00:00`) and bare
/// seconds (`600`). Display always uses the unit-run form.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RosDuration(Duration);

impl RosDuration {
    pub const fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    pub fn as_secs(&self) -> u64 {
        self.0.as_secs()
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

/// Parse RouterOS duration text, yielding `None` when it is malformed.
pub fn parse_duration(val: &str) -> Option<Duration> {
    val.parse::<RosDuration>().ok().map(|d| d.0)
}

fn clock_secs(hours: &str, rest: &str) -> result::Result<u64, String> {
    let (mins, secs) = rest
        .split_once(':')
        .ok_or_else(|| format!("malformed clock: {hours}:{rest}"))?;

    let field = |s: &str, max: Option<u64>| -> result::Result<u64, String> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("malformed clock field: '{s}'"));
        }
        let v = s.parse::<u64>().map_err(|e| format!("{e}"))?;
        match max {
            Some(max) if v >= max => {
                Err(format!("clock field out of range: {v}"))
            }
            _ => Ok(v),
        }
    };

    let h = field(hours, None)?;
    let m = field(mins, Some(60))?;
    let s = field(secs, Some(60))?;
    h.checked_mul(3_600)
        .and_then(|h| h.checked_add(m * 60 + s))
        .ok_or_else(|| "duration overflow".to_string())
}

impl FromStr for RosDuration {
    type Err = String;

    fn from_str(val: &str) -> result::Result<Self, Self::Err> {
        let val = val.trim();
        if val.is_empty() {
            return Err("empty duration".to_string());
        }

        let mut total = 0u64;
        let mut rest = val;

        while !rest.is_empty() {
            let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
            let (num, tail) = rest.split_at(digits);

            // A clock can only be the final component.
            if let Some(clock) = tail.strip_prefix(':') {
                let secs = clock_secs(num, clock)?;
                total = total
                    .checked_add(secs)
                    .ok_or_else(|| "duration overflow".to_string())?;
                break;
            }

            if num.is_empty() {
                return Err(format!("malformed duration: {val}"));
            }
            let n = num.parse::<u64>().map_err(|e| format!("{e}"))?;

            let mut chars = tail.chars();
            let mult = match chars.next() {
                None => 1,
                Some(c) => match UNITS.iter().find(|(u, _)| *u == c) {
                    Some((_, mult)) => *mult,
                    None => return Err(format!("bad duration unit: '{c}'")),
                },
            };

            total = n
                .checked_mul(mult)
                .and_then(|v| total.checked_add(v))
                .ok_or_else(|| "duration overflow".to_string())?;
            rest = chars.as_str();
        }

        Ok(Self::from_secs(total))
    }
}

impl Display for RosDuration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut left = self.as_secs();
        if left == 0 {
            return write!(f, "0s");
        }

        for (unit, size) in UNITS {
            if left >= size {
                write!(f, "{}{unit}", left / size)?;
                left %= size;
            }
        }
        Ok(())
    }
}

impl Serialize for RosDuration {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RosDuration {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
