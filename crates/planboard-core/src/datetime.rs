use std::fmt;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  Datelike,
  Duration,
  NaiveDate,
  Utc
};
use chrono_tz::Tz;

pub const DAY_FORMAT: &str = "%Y-%m-%d";

pub fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::debug!(
        source,
        timezone = %trimmed,
        "configured calendar timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

pub fn today_in_timezone(
  timezone: Tz
) -> NaiveDate {
  Utc::now()
    .with_timezone(&timezone)
    .date_naive()
}

pub fn first_day_of_month(
  year: i32,
  month: u32
) -> Option<NaiveDate> {
  NaiveDate::from_ymd_opt(
    year, month, 1
  )
}

pub fn last_day_of_month(
  year: i32,
  month: u32
) -> Option<NaiveDate> {
  let first =
    first_day_of_month(year, month)?;
  (28..=31)
    .rev()
    .find_map(|day| first.with_day(day))
}

pub fn days_in_month(
  year: i32,
  month: u32
) -> Option<u32> {
  last_day_of_month(year, month)
    .map(|last| last.day())
}

pub fn add_days(
  date: NaiveDate,
  days: i64
) -> NaiveDate {
  date
    .checked_add_signed(Duration::days(
      days
    ))
    .unwrap_or(date)
}

/// Monday of the week containing `day`.
pub fn start_of_week(
  day: NaiveDate
) -> NaiveDate {
  let offset = day
    .weekday()
    .num_days_from_monday()
    as i64;
  add_days(day, -offset)
}

pub fn shift_months(
  date: NaiveDate,
  months: i32
) -> NaiveDate {
  let mut year = date.year();
  let mut month =
    date.month() as i32 + months;

  while month < 1 {
    month += 12;
    year = year.saturating_sub(1);
  }
  while month > 12 {
    month -= 12;
    year = year.saturating_add(1);
  }

  let Some(length) =
    days_in_month(year, month as u32)
  else {
    return date;
  };
  NaiveDate::from_ymd_opt(
    year,
    month as u32,
    date.day().min(length)
  )
  .unwrap_or(date)
}

pub fn format_day(
  day: NaiveDate
) -> String {
  day.format(DAY_FORMAT).to_string()
}

#[tracing::instrument(skip(today))]
pub fn parse_day(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  match token
    .to_ascii_lowercase()
    .as_str()
  {
    | "today" => return Ok(today),
    | "tomorrow" => {
      return Ok(add_days(today, 1));
    }
    | "yesterday" => {
      return Ok(add_days(today, -1));
    }
    | _ => {}
  }

  NaiveDate::parse_from_str(
    token, DAY_FORMAT
  )
  .with_context(|| {
    format!(
      "invalid day {token:?}; \
       expected YYYY-MM-DD"
    )
  })
}

/// A displayed calendar month, held as
/// its first day so every value is a
/// representable date.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
)]
pub struct MonthRef {
  first: NaiveDate
}

impl MonthRef {
  pub fn new(
    year: i32,
    month: u32
  ) -> anyhow::Result<Self> {
    if !(1..=12).contains(&month) {
      return Err(anyhow!(
        "month out of range: {month}"
      ));
    }
    let first =
      first_day_of_month(year, month)
        .ok_or_else(|| {
          anyhow!(
            "year out of range: {year}"
          )
        })?;
    Ok(Self { first })
  }

  pub fn of(day: NaiveDate) -> Self {
    Self {
      first: add_days(
        day,
        -i64::from(day.day0())
      )
    }
  }

  pub fn year(&self) -> i32 {
    self.first.year()
  }

  pub fn month(&self) -> u32 {
    self.first.month()
  }

  pub fn first_day(&self) -> NaiveDate {
    self.first
  }

  pub fn last_day(&self) -> NaiveDate {
    (28..=31)
      .rev()
      .find_map(|day| {
        self.first.with_day(day)
      })
      .unwrap_or(self.first)
  }

  pub fn contains(
    &self,
    day: NaiveDate
  ) -> bool {
    day.year() == self.year()
      && day.month() == self.month()
  }

  pub fn shift(
    &self,
    months: i32
  ) -> Self {
    Self::of(shift_months(
      self.first, months
    ))
  }

  pub fn title(&self) -> String {
    self
      .first
      .format("%B %Y")
      .to_string()
  }

  pub fn parse(
    input: &str,
    today: NaiveDate
  ) -> anyhow::Result<Self> {
    let token = input
      .trim()
      .to_ascii_lowercase();
    let current = Self::of(today);

    match token.as_str() {
      | "" | "this" | "current" => {
        return Ok(current);
      }
      | "next" => {
        return Ok(current.shift(1));
      }
      | "prev" | "previous" | "last" => {
        return Ok(current.shift(-1));
      }
      | _ => {}
    }

    if let Some(month) =
      parse_month_name(&token)
    {
      return Self::new(
        current.year(),
        month
      );
    }

    let (year, month) = token
      .split_once('-')
      .ok_or_else(|| {
        anyhow!(
          "invalid month {input:?}; \
           expected YYYY-MM"
        )
      })?;
    let year: i32 = year
      .parse()
      .with_context(|| {
        format!(
          "invalid year in {input:?}"
        )
      })?;
    let month: u32 = month
      .parse()
      .with_context(|| {
        format!(
          "invalid month in {input:?}"
        )
      })?;
    Self::new(year, month)
  }
}

impl fmt::Display for MonthRef {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(
      f,
      "{:04}-{:02}",
      self.year(),
      self.month()
    )
  }
}

fn parse_month_name(
  token: &str
) -> Option<u32> {
  match token.trim() {
    | "january" | "jan" => Some(1),
    | "february" | "feb" => Some(2),
    | "march" | "mar" => Some(3),
    | "april" | "apr" => Some(4),
    | "may" => Some(5),
    | "june" | "jun" => Some(6),
    | "july" | "jul" => Some(7),
    | "august" | "aug" => Some(8),
    | "september" | "sep" | "sept" => {
      Some(9)
    }
    | "october" | "oct" => Some(10),
    | "november" | "nov" => Some(11),
    | "december" | "dec" => Some(12),
    | _ => None
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::{
    MonthRef,
    days_in_month,
    parse_day,
    shift_months,
    start_of_week
  };

  fn day(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn february_length_follows_leap_years()
  {
    assert_eq!(
      days_in_month(2024, 2),
      Some(29)
    );
    assert_eq!(
      days_in_month(2025, 2),
      Some(28)
    );
    assert_eq!(
      days_in_month(2025, 12),
      Some(31)
    );
    assert_eq!(
      days_in_month(2025, 13),
      None
    );
  }

  #[test]
  fn weeks_start_on_monday() {
    // 2025-03-01 is a Saturday
    assert_eq!(
      start_of_week(day(2025, 3, 1)),
      day(2025, 2, 24)
    );
    assert_eq!(
      start_of_week(day(2025, 3, 10)),
      day(2025, 3, 10)
    );
  }

  #[test]
  fn shifting_months_clamps_the_day() {
    assert_eq!(
      shift_months(
        day(2025, 1, 31),
        1
      ),
      day(2025, 2, 28)
    );
    assert_eq!(
      shift_months(
        day(2025, 1, 15),
        -1
      ),
      day(2024, 12, 15)
    );
  }

  #[test]
  fn parses_relative_and_iso_days() {
    let today = day(2025, 3, 10);
    assert_eq!(
      parse_day("tomorrow", today)
        .expect("parse tomorrow"),
      day(2025, 3, 11)
    );
    assert_eq!(
      parse_day("2025-03-13", today)
        .expect("parse iso"),
      day(2025, 3, 13)
    );
    assert!(
      parse_day("13/03/2025", today)
        .is_err()
    );
  }

  #[test]
  fn parses_month_references() {
    let today = day(2025, 3, 10);
    assert_eq!(
      MonthRef::parse("2025-11", today)
        .expect("parse iso month"),
      MonthRef::new(2025, 11)
        .expect("valid month")
    );
    assert_eq!(
      MonthRef::parse("next", today)
        .expect("parse next")
        .to_string(),
      "2025-04"
    );
    assert_eq!(
      MonthRef::parse("dec", today)
        .expect("parse name")
        .title(),
      "December 2025"
    );
    assert!(
      MonthRef::parse("2025-13", today)
        .is_err()
    );
  }

  #[test]
  fn months_beyond_the_calendar_are_rejected()
  {
    let today = day(2025, 3, 10);
    assert!(
      MonthRef::parse(
        "300000-03",
        today
      )
      .is_err()
    );
    assert!(
      MonthRef::new(-300000, 1).is_err()
    );

    let last = MonthRef::of(
      NaiveDate::MAX
    );
    assert_eq!(
      last.last_day(),
      NaiveDate::MAX
    );
    assert_eq!(last.shift(1), last);
  }
}
