use chrono::NaiveDate;

use crate::model::*;

/// Read-only view over a set of blackout windows, answering "is this date,
/// or this date and minute, excluded?".
#[derive(Debug, Clone, Copy, Default)]
pub struct BlackoutRegistry<'a> {
    windows: &'a [BlackoutWindow],
}

impl<'a> BlackoutRegistry<'a> {
    pub fn new(windows: &'a [BlackoutWindow]) -> Self {
        Self { windows }
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Windows declared for `date`. Usually zero or one, but any number is allowed.
    pub fn windows_for(self, date: NaiveDate) -> impl Iterator<Item = &'a BlackoutWindow> + 'a {
        self.windows.iter().filter(move |w| w.date == date)
    }

    pub fn is_fully_blocked(&self, date: NaiveDate) -> bool {
        self.windows_for(date).any(BlackoutWindow::is_full_day)
    }

    /// Half-open: a window ending at `m` does not block a slot starting at `m`.
    pub fn is_minute_blocked(&self, date: NaiveDate, minute: Minute) -> bool {
        self.blocking_window(date, minute).is_some()
    }

    /// First window that blocks `minute` on `date`, full-day windows first.
    pub fn blocking_window(&self, date: NaiveDate, minute: Minute) -> Option<&'a BlackoutWindow> {
        self.windows_for(date)
            .find(|w| w.is_full_day())
            .or_else(|| {
                self.windows_for(date).find(|w| match w.coverage {
                    BlackoutCoverage::Partial { span } => span.contains_minute(minute),
                    BlackoutCoverage::FullDay => false,
                })
            })
    }
}

impl<'a> From<&'a [BlackoutWindow]> for BlackoutRegistry<'a> {
    fn from(windows: &'a [BlackoutWindow]) -> Self {
        Self::new(windows)
    }
}

impl<'a> From<&'a Vec<BlackoutWindow>> for BlackoutRegistry<'a> {
    fn from(windows: &'a Vec<BlackoutWindow>) -> Self {
        Self::new(windows)
    }
}
