use rand::Rng;

use super::{GenContext, Generator};
use crate::error::Result;
use crate::value::Value;

/// Days since the Unix epoch for a fixed `(year, month, day)`, used to
/// pick a random calendar date within `[start, end]` without pulling in
/// a date/time crate the rest of the engine has no other use for.
fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as i64;
    let mp = (month as i64 + 9) % 12;
    let doy = (153 * mp + 2) / 5 + day as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146097 + doe - 719468
}

fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as i64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = if month <= 2 { y + 1 } else { y };
    (year, month, day)
}

/// A window of calendar dates to draw from.
#[derive(Debug, Clone)]
pub struct DateWindow {
    pub start: (i64, u32, u32),
    pub end: (i64, u32, u32),
}

impl Default for DateWindow {
    fn default() -> Self {
        DateWindow {
            start: (2000, 1, 1),
            end: (2030, 12, 31),
        }
    }
}

impl DateWindow {
    fn random_day(&self, rng: &mut impl rand::Rng) -> (i64, u32, u32) {
        let lo = days_from_civil(self.start.0, self.start.1, self.start.2);
        let hi = days_from_civil(self.end.0, self.end.1, self.end.2);
        let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        civil_from_days(rng.random_range(lo..=hi))
    }
}

#[derive(Debug, Default)]
pub struct DateGen {
    pub window: DateWindow,
}

impl Generator for DateGen {
    fn generate(&self, ctx: &mut GenContext<'_>) -> Result<Value> {
        let (y, m, d) = self.window.random_day(ctx.rng);
        Ok(Value::Str(format!("{y:04}-{m:02}-{d:02}")))
    }
}

#[derive(Debug, Default)]
pub struct DateTimeGen {
    pub window: DateWindow,
}

impl Generator for DateTimeGen {
    fn generate(&self, ctx: &mut GenContext<'_>) -> Result<Value> {
        let (y, m, d) = self.window.random_day(ctx.rng);
        let h = ctx.rng.random_range(0u8..=23);
        let min = ctx.rng.random_range(0u8..=59);
        let s = ctx.rng.random_range(0u8..=59);
        Ok(Value::Str(format!(
            "{y:04}-{m:02}-{d:02} {h:02}:{min:02}:{s:02}"
        )))
    }
}

#[derive(Debug, Default)]
pub struct TimeGen;

impl Generator for TimeGen {
    fn generate(&self, ctx: &mut GenContext<'_>) -> Result<Value> {
        let h = ctx.rng.random_range(0u8..=23);
        let m = ctx.rng.random_range(0u8..=59);
        let s = ctx.rng.random_range(0u8..=59);
        Ok(Value::Str(format!("{h:02}:{m:02}:{s:02}")))
    }
}

/// `Time`'s timezone-aware counterpart, for PostgreSQL's `timetz` columns.
#[derive(Debug, Default)]
pub struct TimeTzGen;

impl Generator for TimeTzGen {
    fn generate(&self, ctx: &mut GenContext<'_>) -> Result<Value> {
        let h = ctx.rng.random_range(0u8..=23);
        let m = ctx.rng.random_range(0u8..=59);
        let s = ctx.rng.random_range(0u8..=59);
        let offset = ctx.rng.random_range(-12i8..=14);
        Ok(Value::Str(format!("{h:02}:{m:02}:{s:02}{offset:+03}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn ctx(rng: &mut StdRng) -> GenContext<'_> {
        GenContext { rng, index: 0 }
    }

    #[test]
    fn date_stays_within_window() {
        let mut rng = StdRng::seed_from_u64(42);
        let gen = DateGen {
            window: DateWindow { start: (2020, 1, 1), end: (2020, 1, 31) },
        };
        for _ in 0..50 {
            match gen.generate(&mut ctx(&mut rng)).unwrap() {
                Value::Str(s) => assert!(s.starts_with("2020-01-")),
                other => panic!("expected Str, got {other:?}"),
            }
        }
    }

    #[test]
    fn datetime_has_date_and_time_parts() {
        let mut rng = StdRng::seed_from_u64(42);
        let gen = DateTimeGen::default();
        match gen.generate(&mut ctx(&mut rng)).unwrap() {
            Value::Str(s) => {
                assert_eq!(s.len(), 19);
                assert_eq!(&s[10..11], " ");
            }
            other => panic!("expected Str, got {other:?}"),
        }
    }

    #[test]
    fn timetz_contains_offset_sign() {
        let mut rng = StdRng::seed_from_u64(42);
        let gen = TimeTzGen;
        match gen.generate(&mut ctx(&mut rng)).unwrap() {
            Value::Str(s) => assert!(s.contains('+') || s.contains('-')),
            other => panic!("expected Str, got {other:?}"),
        }
    }

    #[test]
    fn civil_day_roundtrip() {
        for days in [-100_000i64, 0, 19723, 500_000] {
            let (y, m, d) = civil_from_days(days);
            assert_eq!(days_from_civil(y, m, d), days);
        }
    }
}
