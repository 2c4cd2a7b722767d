//! Lexical forms and calendar arithmetic for date, time and duration values.

use std::str::FromStr;

use chrono::{Datelike, FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

const NANOS_PER_SEC: i64 = 1_000_000_000;

struct Lexer<'a> {
    s: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(s: &'a str) -> Self {
        Self {
            s: s.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.s.get(self.pos).copied()
    }

    fn eat(&mut self, c: u8) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn at_end(&self) -> bool {
        self.pos == self.s.len()
    }

    /// A run of ASCII digits; returns the digits as text.
    fn digit_run(&mut self) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        // digits are ASCII, so the slice is valid UTF-8
        std::str::from_utf8(&self.s[start..self.pos]).unwrap_or("")
    }

    /// Exactly `n` digits.
    fn fixed(&mut self, n: usize) -> Option<u32> {
        let run = self.s.get(self.pos..self.pos + n)?;
        if !run.iter().all(u8::is_ascii_digit) {
            return None;
        }
        self.pos += n;
        Some(run.iter().fold(0u32, |acc, d| acc * 10 + u32::from(d - b'0')))
    }

    fn year(&mut self) -> Option<i32> {
        let negative = self.eat(b'-');
        let digits = self.digit_run();
        if digits.len() < 4 || (digits.len() > 4 && digits.starts_with('0')) {
            return None;
        }
        let y: i32 = digits.parse().ok()?;
        Some(if negative { -y } else { y })
    }

    /// Fractional seconds after a '.', as nanoseconds (extra digits truncated).
    fn fraction(&mut self) -> Option<u32> {
        if !self.eat(b'.') {
            return Some(0);
        }
        let digits = self.digit_run();
        if digits.is_empty() {
            return None;
        }
        let nanos = digits
            .bytes()
            .chain(std::iter::repeat(b'0'))
            .take(9)
            .fold(0u32, |acc, d| acc * 10 + u32::from(d - b'0'));
        Some(nanos)
    }

    fn timezone(&mut self) -> Option<Option<FixedOffset>> {
        if self.at_end() {
            return Some(None);
        }
        if self.eat(b'Z') {
            return FixedOffset::east_opt(0).map(Some);
        }
        let sign = match self.peek()? {
            b'+' => 1,
            b'-' => -1,
            _ => return None,
        };
        self.pos += 1;
        let hh = self.fixed(2)?;
        if !self.eat(b':') {
            return None;
        }
        let mm = self.fixed(2)?;
        if mm > 59 || hh > 14 || (hh == 14 && mm != 0) {
            return None;
        }
        let secs = i32::try_from(hh * 3600 + mm * 60).ok()?;
        FixedOffset::east_opt(sign * secs).map(Some)
    }

    fn finish<T>(self, value: T) -> Option<T> {
        self.at_end().then_some(value)
    }
}

fn date_part(lx: &mut Lexer<'_>) -> Option<NaiveDate> {
    let year = lx.year()?;
    if !lx.eat(b'-') {
        return None;
    }
    let month = lx.fixed(2)?;
    if !lx.eat(b'-') {
        return None;
    }
    let day = lx.fixed(2)?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Returns the time and whether it was written as `24:00:00`.
fn time_part(lx: &mut Lexer<'_>) -> Option<(NaiveTime, bool)> {
    let h = lx.fixed(2)?;
    if !lx.eat(b':') {
        return None;
    }
    let m = lx.fixed(2)?;
    if !lx.eat(b':') {
        return None;
    }
    let s = lx.fixed(2)?;
    let nanos = lx.fraction()?;
    if h == 24 && m == 0 && s == 0 && nanos == 0 {
        return Some((NaiveTime::MIN, true));
    }
    if s > 59 {
        return None;
    }
    NaiveTime::from_hms_nano_opt(h, m, s, nanos).map(|t| (t, false))
}

pub fn parse_date(s: &str) -> Option<(NaiveDate, Option<FixedOffset>)> {
    let mut lx = Lexer::new(s);
    let date = date_part(&mut lx)?;
    let tz = lx.timezone()?;
    lx.finish((date, tz))
}

pub fn parse_time(s: &str) -> Option<(NaiveTime, Option<FixedOffset>)> {
    let mut lx = Lexer::new(s);
    let (time, _) = time_part(&mut lx)?;
    let tz = lx.timezone()?;
    lx.finish((time, tz))
}

pub fn parse_date_time(s: &str) -> Option<(NaiveDateTime, Option<FixedOffset>)> {
    let mut lx = Lexer::new(s);
    let date = date_part(&mut lx)?;
    if !lx.eat(b'T') {
        return None;
    }
    let (time, end_of_day) = time_part(&mut lx)?;
    let tz = lx.timezone()?;
    let date = if end_of_day { date.succ_opt()? } else { date };
    lx.finish((date.and_time(time), tz))
}

pub fn parse_g_year(s: &str) -> Option<(i32, Option<FixedOffset>)> {
    let mut lx = Lexer::new(s);
    let year = lx.year()?;
    let tz = lx.timezone()?;
    lx.finish((year, tz))
}

pub fn parse_g_year_month(s: &str) -> Option<(i32, u8, Option<FixedOffset>)> {
    let mut lx = Lexer::new(s);
    let year = lx.year()?;
    if !lx.eat(b'-') {
        return None;
    }
    let month = u8::try_from(lx.fixed(2)?).ok().filter(|m| (1..=12).contains(m))?;
    let tz = lx.timezone()?;
    lx.finish((year, month, tz))
}

pub fn parse_g_month(s: &str) -> Option<(u8, Option<FixedOffset>)> {
    let rest = s.strip_prefix("--")?;
    let mut lx = Lexer::new(rest);
    let month = u8::try_from(lx.fixed(2)?).ok().filter(|m| (1..=12).contains(m))?;
    let tz = lx.timezone()?;
    lx.finish((month, tz))
}

pub fn parse_g_month_day(s: &str) -> Option<(u8, u8, Option<FixedOffset>)> {
    let rest = s.strip_prefix("--")?;
    let mut lx = Lexer::new(rest);
    let month = lx.fixed(2)?;
    if !lx.eat(b'-') {
        return None;
    }
    let day = lx.fixed(2)?;
    // validated against a leap year so that --02-29 is accepted
    NaiveDate::from_ymd_opt(2000, month, day)?;
    let tz = lx.timezone()?;
    lx.finish((u8::try_from(month).ok()?, u8::try_from(day).ok()?, tz))
}

pub fn parse_g_day(s: &str) -> Option<(u8, Option<FixedOffset>)> {
    let rest = s.strip_prefix("---")?;
    let mut lx = Lexer::new(rest);
    let day = u8::try_from(lx.fixed(2)?).ok().filter(|d| (1..=31).contains(d))?;
    let tz = lx.timezone()?;
    lx.finish((day, tz))
}

/// Components of a duration literal, signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationParts {
    pub months: i64,
    pub seconds: Decimal,
    pub has_year_month: bool,
    pub has_day_time: bool,
}

pub fn parse_duration(s: &str) -> Option<DurationParts> {
    let (negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let body = body.strip_prefix('P')?;
    let (date, time) = match body.split_once('T') {
        Some((d, t)) if !t.is_empty() => (d, Some(t)),
        Some(_) => return None,
        None => (body, None),
    };

    let mut months = 0i64;
    let mut seconds = Decimal::ZERO;
    let mut has_year_month = false;
    let mut has_day_time = false;

    // designators must appear in this order, each at most once
    let mut lx = Lexer::new(date);
    let mut allowed: &[u8] = b"YMD";
    while !lx.at_end() {
        let digits = lx.digit_run();
        let designator = lx.peek()?;
        lx.pos += 1;
        let idx = allowed.iter().position(|&d| d == designator)?;
        allowed = &allowed[idx + 1..];
        let n: i64 = digits.parse().ok()?;
        match designator {
            b'Y' => months = months.checked_add(n.checked_mul(12)?)?,
            b'M' => months = months.checked_add(n)?,
            _ => seconds += Decimal::from(n) * Decimal::from(86_400),
        }
        if designator == b'D' {
            has_day_time = true;
        } else {
            has_year_month = true;
        }
    }

    if let Some(time) = time {
        let mut lx = Lexer::new(time);
        let mut allowed: &[u8] = b"HMS";
        while !lx.at_end() {
            let start = lx.pos;
            let digits = lx.digit_run();
            if digits.is_empty() {
                return None;
            }
            let mut text = &time[start..lx.pos];
            if lx.peek() == Some(b'.') {
                lx.pos += 1;
                if lx.digit_run().is_empty() {
                    return None;
                }
                text = &time[start..lx.pos];
            }
            let designator = lx.peek()?;
            lx.pos += 1;
            let idx = allowed.iter().position(|&d| d == designator)?;
            allowed = &allowed[idx + 1..];
            let has_fraction = text.contains('.');
            if has_fraction && designator != b'S' {
                return None;
            }
            let n = Decimal::from_str(text).ok()?;
            let factor = match designator {
                b'H' => 3600,
                b'M' => 60,
                _ => 1,
            };
            seconds = seconds.checked_add(n.checked_mul(Decimal::from(factor))?)?;
            has_day_time = true;
        }
    }

    if !has_year_month && !has_day_time {
        return None;
    }
    if negative {
        months = -months;
        seconds = -seconds;
    }
    Some(DurationParts {
        months,
        seconds,
        has_year_month,
        has_day_time,
    })
}

pub fn parse_year_month_duration(s: &str) -> Option<i32> {
    let parts = parse_duration(s).filter(|p| !p.has_day_time)?;
    i32::try_from(parts.months).ok()
}

pub fn parse_day_time_duration(s: &str) -> Option<Decimal> {
    parse_duration(s)
        .filter(|p| !p.has_year_month)
        .map(|p| p.seconds)
}

fn format_year(year: i32) -> String {
    if year < 0 {
        format!("-{:04}", year.unsigned_abs())
    } else {
        format!("{year:04}")
    }
}

pub fn format_timezone(tz: Option<FixedOffset>) -> String {
    let Some(off) = tz else {
        return String::new();
    };
    let secs = off.local_minus_utc();
    if secs == 0 {
        return "Z".to_string();
    }
    let sign = if secs < 0 { '-' } else { '+' };
    let abs = secs.unsigned_abs();
    format!("{}{:02}:{:02}", sign, abs / 3600, (abs % 3600) / 60)
}

fn format_seconds(sec: u32, nanos: u32) -> String {
    if nanos == 0 {
        return format!("{sec:02}");
    }
    let frac = format!("{nanos:09}");
    format!("{:02}.{}", sec, frac.trim_end_matches('0'))
}

pub fn format_date(date: NaiveDate, tz: Option<FixedOffset>) -> String {
    format!(
        "{}-{:02}-{:02}{}",
        format_year(date.year()),
        date.month(),
        date.day(),
        format_timezone(tz)
    )
}

pub fn format_time(time: NaiveTime, tz: Option<FixedOffset>) -> String {
    format!(
        "{:02}:{:02}:{}{}",
        time.hour(),
        time.minute(),
        format_seconds(time.second(), time.nanosecond()),
        format_timezone(tz)
    )
}

pub fn format_date_time(dt: NaiveDateTime, tz: Option<FixedOffset>) -> String {
    let date = format_date(dt.date(), None);
    let time = format_time(dt.time(), tz);
    format!("{date}T{time}")
}

pub fn format_year_month_duration(months: i32) -> String {
    if months == 0 {
        return "P0M".to_string();
    }
    let abs = months.unsigned_abs();
    let (y, m) = (abs / 12, abs % 12);
    let mut out = String::new();
    if months < 0 {
        out.push('-');
    }
    out.push('P');
    if y != 0 {
        out.push_str(&format!("{y}Y"));
    }
    if m != 0 {
        out.push_str(&format!("{m}M"));
    }
    out
}

pub fn format_day_time_duration(seconds: Decimal) -> String {
    if seconds.is_zero() {
        return "PT0S".to_string();
    }
    let mut rest = seconds.abs();
    let mut take = |unit: i64| {
        let unit = Decimal::from(unit);
        let whole = (rest / unit).trunc();
        rest -= whole * unit;
        whole
    };
    let days = take(86_400);
    let hours = take(3600);
    let minutes = take(60);
    let secs = rest.normalize();

    let mut out = String::new();
    if seconds.is_sign_negative() {
        out.push('-');
    }
    out.push('P');
    if !days.is_zero() {
        out.push_str(&format!("{days}D"));
    }
    if !(hours.is_zero() && minutes.is_zero() && secs.is_zero()) {
        out.push('T');
        if !hours.is_zero() {
            out.push_str(&format!("{hours}H"));
        }
        if !minutes.is_zero() {
            out.push_str(&format!("{minutes}M"));
        }
        if !secs.is_zero() {
            out.push_str(&format!("{secs}S"));
        }
    }
    out
}

pub fn format_g_year(year: i32, tz: Option<FixedOffset>) -> String {
    format!("{}{}", format_year(year), format_timezone(tz))
}

pub fn format_g_year_month(year: i32, month: u8, tz: Option<FixedOffset>) -> String {
    format!("{}-{:02}{}", format_year(year), month, format_timezone(tz))
}

pub fn format_g_month(month: u8, tz: Option<FixedOffset>) -> String {
    format!("--{:02}{}", month, format_timezone(tz))
}

pub fn format_g_month_day(month: u8, day: u8, tz: Option<FixedOffset>) -> String {
    format!("--{:02}-{:02}{}", month, day, format_timezone(tz))
}

pub fn format_g_day(day: u8, tz: Option<FixedOffset>) -> String {
    format!("---{:02}{}", day, format_timezone(tz))
}

/// Add (or subtract) calendar months; a day past the end of the target month
/// is clamped to its last day.
pub fn add_months_clamped(date: NaiveDate, months: i32) -> Option<NaiveDate> {
    let delta = Months::new(months.unsigned_abs());
    if months < 0 {
        date.checked_sub_months(delta)
    } else {
        date.checked_add_months(delta)
    }
}

pub fn add_months_clamped_dt(dt: NaiveDateTime, months: i32) -> Option<NaiveDateTime> {
    add_months_clamped(dt.date(), months).map(|d| d.and_time(dt.time()))
}

/// `xs:dayTimeDuration` seconds to a chrono delta with nanosecond precision.
pub fn seconds_to_delta(seconds: Decimal) -> Option<TimeDelta> {
    let whole = seconds.trunc();
    let nanos = ((seconds - whole) * Decimal::from(NANOS_PER_SEC)).trunc();
    TimeDelta::try_seconds(whole.to_i64()?)?.checked_add(&TimeDelta::nanoseconds(nanos.to_i64()?))
}

pub fn delta_to_seconds(delta: TimeDelta) -> Decimal {
    Decimal::from(delta.num_seconds()) + Decimal::new(i64::from(delta.subsec_nanos()), 9)
}

/// Normalize to UTC. Values without a timezone are taken as UTC.
pub fn to_utc(dt: NaiveDateTime, tz: Option<FixedOffset>) -> Option<NaiveDateTime> {
    match tz {
        Some(off) => dt.checked_sub_signed(TimeDelta::seconds(i64::from(off.local_minus_utc()))),
        None => Some(dt),
    }
}
