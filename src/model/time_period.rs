use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use core::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};
use strum::{Display as StrumDisplay, EnumString};

/// The calendar shape a [`TimePeriod`] was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, StrumDisplay, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PeriodKind {
    Custom,
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

/// Why a period could not be built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeriodError {
    /// The start lies after the end.
    StartAfterEnd { start: DateTime<Utc>, end: DateTime<Utc> },

    /// The calendar inputs do not name a real date.
    InvalidDate(String),
}

impl Display for PeriodError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::StartAfterEnd { start, end } => {
                write!(f, "period start {} must not be after its end {}", start.to_rfc3339(), end.to_rfc3339())
            }
            Self::InvalidDate(what) => write!(f, "invalid period: {what}"),
        }
    }
}

impl core::error::Error for PeriodError {}

/// An inclusive time range.
///
/// `start <= end` always holds; every constructor checks it, including deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PeriodRecord", into = "PeriodRecord")]
pub struct TimePeriod {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    kind: PeriodKind,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct PeriodRecord {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    kind: PeriodKind,
}

impl TimePeriod {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, kind: PeriodKind) -> Result<Self, PeriodError> {
        if start > end {
            return Err(PeriodError::StartAfterEnd { start, end });
        }

        Ok(Self { start, end, kind })
    }

    pub fn custom(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, PeriodError> {
        Self::new(start, end, PeriodKind::Custom)
    }

    /// From the first instant of `first` to the last second of `last`.
    pub fn from_dates(first: NaiveDate, last: NaiveDate) -> Result<Self, PeriodError> {
        Self::custom(start_of_day(first), end_of_day(last))
    }

    #[must_use]
    pub fn daily(day: NaiveDate) -> Self {
        Self {
            start: start_of_day(day),
            end: end_of_day(day),
            kind: PeriodKind::Daily,
        }
    }

    /// The ISO week (Monday through Sunday) containing `day`.
    pub fn weekly(day: NaiveDate) -> Result<Self, PeriodError> {
        let week = day.iso_week();
        let monday = NaiveDate::from_isoywd_opt(week.year(), week.week(), chrono::Weekday::Mon)
            .ok_or_else(|| PeriodError::InvalidDate(format!("no ISO week for {day}")))?;
        let sunday = monday
            .checked_add_days(Days::new(6))
            .ok_or_else(|| PeriodError::InvalidDate(format!("week of {day} is out of range")))?;

        Self::new(start_of_day(monday), end_of_day(sunday), PeriodKind::Weekly)
    }

    pub fn monthly(year: i32, month: u32) -> Result<Self, PeriodError> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| PeriodError::InvalidDate(format!("month {month} of {year}")))?;
        let last = last_day_of_month(first)?;

        Self::new(start_of_day(first), end_of_day(last), PeriodKind::Monthly)
    }

    pub fn quarterly(year: i32, quarter: u32) -> Result<Self, PeriodError> {
        if !(1..=4).contains(&quarter) {
            return Err(PeriodError::InvalidDate(format!("quarter {quarter} of {year}")));
        }

        let first_month = (quarter - 1) * 3 + 1;
        let first = NaiveDate::from_ymd_opt(year, first_month, 1)
            .ok_or_else(|| PeriodError::InvalidDate(format!("quarter {quarter} of {year}")))?;
        let third_month = first
            .checked_add_months(Months::new(2))
            .ok_or_else(|| PeriodError::InvalidDate(format!("quarter {quarter} of {year}")))?;
        let last = last_day_of_month(third_month)?;

        Self::new(start_of_day(first), end_of_day(last), PeriodKind::Quarterly)
    }

    pub fn yearly(year: i32) -> Result<Self, PeriodError> {
        let first = NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(|| PeriodError::InvalidDate(format!("year {year}")))?;
        let last = NaiveDate::from_ymd_opt(year, 12, 31).ok_or_else(|| PeriodError::InvalidDate(format!("year {year}")))?;

        Self::new(start_of_day(first), end_of_day(last), PeriodKind::Yearly)
    }

    /// The `days` calendar days ending with `today`, inclusive.
    pub fn last_days(days: u32, today: NaiveDate) -> Result<Self, PeriodError> {
        if days == 0 {
            return Err(PeriodError::InvalidDate("a trailing window needs at least one day".to_string()));
        }

        let first = today
            .checked_sub_days(Days::new(u64::from(days - 1)))
            .ok_or_else(|| PeriodError::InvalidDate(format!("{days} days before {today}")))?;

        Self::new(start_of_day(first), end_of_day(today), PeriodKind::Custom)
    }

    #[must_use]
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    #[must_use]
    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    #[must_use]
    pub const fn kind(&self) -> PeriodKind {
        self.kind
    }

    /// Inclusive on both ends.
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }

    /// Whether the period ended before the calendar day of `now` began.
    #[must_use]
    pub fn ended_before_day_of(&self, now: DateTime<Utc>) -> bool {
        self.end < start_of_day(now.date_naive())
    }
}

impl Display for TimePeriod {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} {} to {}", self.kind, self.start.date_naive(), self.end.date_naive())
    }
}

impl TryFrom<PeriodRecord> for TimePeriod {
    type Error = PeriodError;

    fn try_from(record: PeriodRecord) -> Result<Self, PeriodError> {
        Self::new(record.start, record.end, record.kind)
    }
}

impl From<TimePeriod> for PeriodRecord {
    fn from(period: TimePeriod) -> Self {
        Self {
            start: period.start,
            end: period.end,
            kind: period.kind,
        }
    }
}

fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    NaiveDateTime::new(day, NaiveTime::MIN).and_utc()
}

fn end_of_day(day: NaiveDate) -> DateTime<Utc> {
    let last_second = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
    NaiveDateTime::new(day, last_second).and_utc()
}

fn last_day_of_month(first: NaiveDate) -> Result<NaiveDate, PeriodError> {
    first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .ok_or_else(|| PeriodError::InvalidDate(format!("month containing {first}")))
}
