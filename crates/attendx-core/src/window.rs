use chrono::{Local, NaiveTime, Timelike};

use crate::errors::{AppError, AppResult};

/// Time-of-day gate for attendance marking. Unrestricted unless both a
/// start and an end hour are configured. A window whose start is later
/// than its end wraps past midnight (e.g. 22..6 admits 23:00 and 05:00).
#[derive(Debug, Clone, Copy, Default)]
pub struct LectureWindow {
    bounds: Option<(u32, u32)>,
}

impl LectureWindow {
    pub fn unrestricted() -> Self {
        Self { bounds: None }
    }

    pub fn between(start_hour: u32, end_hour: u32) -> AppResult<Self> {
        if start_hour > 23 || end_hour > 23 {
            return Err(AppError::Internal(format!(
                "lecture window hours must be 0..=23, got {start_hour}..{end_hour}"
            )));
        }
        Ok(Self {
            bounds: Some((start_hour, end_hour)),
        })
    }

    pub fn from_bounds(start_hour: Option<u32>, end_hour: Option<u32>) -> AppResult<Self> {
        match (start_hour, end_hour) {
            (Some(start), Some(end)) => Self::between(start, end),
            (None, None) => Ok(Self::unrestricted()),
            _ => Err(AppError::Internal(
                "lecture window requires both start and end hour, or neither".into(),
            )),
        }
    }

    pub fn check_now(&self) -> AppResult<()> {
        self.check_at(Local::now().time())
    }

    pub fn check_at(&self, time: NaiveTime) -> AppResult<()> {
        let Some((start, end)) = self.bounds else {
            return Ok(());
        };

        let hour = time.hour();
        let inside = if start <= end {
            hour >= start && hour < end
        } else {
            hour >= start || hour < end
        };

        if inside {
            Ok(())
        } else {
            Err(AppError::OutsideTimeWindow)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(hour: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, 30, 0).unwrap()
    }

    #[test]
    fn unrestricted_window_admits_any_hour() {
        let window = LectureWindow::unrestricted();
        window.check_at(at(0)).unwrap();
        window.check_at(at(23)).unwrap();
    }

    #[test]
    fn daytime_window_rejects_evening() {
        let window = LectureWindow::between(9, 17).unwrap();
        window.check_at(at(9)).unwrap();
        window.check_at(at(16)).unwrap();
        assert!(matches!(
            window.check_at(at(17)).unwrap_err(),
            AppError::OutsideTimeWindow
        ));
        assert!(window.check_at(at(20)).is_err());
    }

    #[test]
    fn overnight_window_wraps_midnight() {
        let window = LectureWindow::between(22, 6).unwrap();
        window.check_at(at(23)).unwrap();
        window.check_at(at(5)).unwrap();
        assert!(window.check_at(at(12)).is_err());
    }

    #[test]
    fn partial_bounds_are_rejected() {
        let err = LectureWindow::from_bounds(Some(9), None).unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[test]
    fn out_of_range_hours_are_rejected() {
        assert!(LectureWindow::between(9, 24).is_err());
    }
}
