// region:    --- Imports
use chrono::{DateTime, Datelike, Duration, Local, TimeZone, Utc};

// endregion: --- Imports

// region:    --- Time Windows

/// 클라이언트 측 시간 구간 필터
/// 각 항목의 기준 시각을 로컬 타임존으로 평가한다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    /// [로컬 자정, +24h)
    Today,
    /// [가장 최근 일요일 로컬 자정, +7d)
    ThisWeek,
    /// [이달 1일 로컬 자정, +30d) — 달력 월이 아닌 고정 30일 구간 (관측된 동작 유지)
    ThisMonth,
    /// 기준 시각이 now 보다 엄격히 이전
    Passed,
}

impl TimeWindow {
    /// 필터 키 해석 (해당 없으면 서버 측 필터로 취급)
    pub fn parse(key: &str) -> Option<Self> {
        match key {
            "today" => Some(TimeWindow::Today),
            "thisWeek" | "this_week" => Some(TimeWindow::ThisWeek),
            "thisMonth" | "this_month" => Some(TimeWindow::ThisMonth),
            "passed" => Some(TimeWindow::Passed),
            _ => None,
        }
    }

    /// 기준 시각이 구간에 포함되는지 평가
    pub fn contains(&self, reference: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let reference = reference.with_timezone(&Local);
        let now = now.with_timezone(&Local);

        match self {
            TimeWindow::Today => {
                let start = local_midnight(now);
                reference >= start && reference < start + Duration::days(1)
            }
            TimeWindow::ThisWeek => {
                let offset = now.weekday().num_days_from_sunday() as i64;
                let start = local_midnight(now) - Duration::days(offset);
                reference >= start && reference < start + Duration::days(7)
            }
            TimeWindow::ThisMonth => {
                let start = first_of_month_midnight(now);
                reference >= start && reference < start + Duration::days(30)
            }
            TimeWindow::Passed => reference < now,
        }
    }
}

/// 로컬 자정
fn local_midnight(dt: DateTime<Local>) -> DateTime<Local> {
    let naive = dt.date_naive().and_hms_opt(0, 0, 0).unwrap_or(dt.naive_local());
    Local.from_local_datetime(&naive).earliest().unwrap_or(dt)
}

/// 이달 1일 로컬 자정
fn first_of_month_midnight(dt: DateTime<Local>) -> DateTime<Local> {
    let first = dt.date_naive().with_day(1).unwrap_or(dt.date_naive());
    let naive = first.and_hms_opt(0, 0, 0).unwrap_or(dt.naive_local());
    Local.from_local_datetime(&naive).earliest().unwrap_or(dt)
}

// endregion: --- Time Windows
