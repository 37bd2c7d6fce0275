use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Candle period an evaluation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimeFrame {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "2h")]
    TwoHours,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "3d")]
    ThreeDays,
    #[serde(rename = "1w")]
    OneWeek,
    #[serde(rename = "1M")]
    OneMonth,
}

impl TimeFrame {
    pub const ALL: [TimeFrame; 10] = [
        TimeFrame::OneMinute,
        TimeFrame::FiveMinutes,
        TimeFrame::ThirtyMinutes,
        TimeFrame::OneHour,
        TimeFrame::TwoHours,
        TimeFrame::FourHours,
        TimeFrame::OneDay,
        TimeFrame::ThreeDays,
        TimeFrame::OneWeek,
        TimeFrame::OneMonth,
    ];

    pub fn minutes(&self) -> u64 {
        match self {
            TimeFrame::OneMinute => 1,
            TimeFrame::FiveMinutes => 5,
            TimeFrame::ThirtyMinutes => 30,
            TimeFrame::OneHour => 60,
            TimeFrame::TwoHours => 120,
            TimeFrame::FourHours => 240,
            TimeFrame::OneDay => 1440,
            TimeFrame::ThreeDays => 4320,
            TimeFrame::OneWeek => 10080,
            TimeFrame::OneMonth => 43200,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.minutes() * 60)
    }

    /// Weight of a TA note produced on this time frame when notes are blended.
    ///
    /// Grows with the period: a monthly signal counts ten times a one minute one.
    pub fn relevance(&self) -> f64 {
        match Self::ALL.iter().position(|tf| tf == self) {
            Some(index) => (index + 1) as f64,
            None => 1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeFrame::OneMinute => "1m",
            TimeFrame::FiveMinutes => "5m",
            TimeFrame::ThirtyMinutes => "30m",
            TimeFrame::OneHour => "1h",
            TimeFrame::TwoHours => "2h",
            TimeFrame::FourHours => "4h",
            TimeFrame::OneDay => "1d",
            TimeFrame::ThreeDays => "3d",
            TimeFrame::OneWeek => "1w",
            TimeFrame::OneMonth => "1M",
        }
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
