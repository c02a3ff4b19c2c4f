//! NSE/MCX trading-session calendar (§4.7: "outside instrument market hours
//! or on a configured market holiday (NSE/MCX calendars, weekends
//! auto-blocked)"; §6 `/holidays/{NSE|MCX}`).
//!
//! MCX closing time shifts between summer and winter IST sessions
//! (`config::MarketHoursEnvConfig`); holidays are a fixed list reloaded only
//! on restart, matching the "fixed option set" posture of §6.

use crate::config::MarketHoursEnvConfig;
use crate::domain::instrument::Exchange;
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Timelike, Utc, Weekday};

pub struct MarketCalendar {
    hours: MarketHoursEnvConfig,
    nse_holidays: Vec<NaiveDate>,
    mcx_holidays: Vec<NaiveDate>,
}

impl MarketCalendar {
    pub fn new(hours: MarketHoursEnvConfig, nse_holidays: Vec<NaiveDate>, mcx_holidays: Vec<NaiveDate>) -> Self {
        Self { hours, nse_holidays, mcx_holidays }
    }

    pub fn is_open(&self, exchange: Exchange, at: DateTime<Utc>) -> bool {
        let ist = at; // clock callers are expected to pass IST-equivalent instants; see Clock port
        if matches!(ist.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        let date = ist.date_naive();
        if self.is_holiday(exchange, date) {
            return false;
        }
        let (start, end) = match exchange {
            Exchange::Nfo => (&self.hours.nse_start, self.nse_close(date)),
            Exchange::Mcx => (&self.hours.mcx_start, self.mcx_close(date)),
        };
        let Some(start) = parse_time(start) else { return false };
        let Some(end) = parse_time(&end) else { return false };
        let now = ist.time();
        now >= start && now <= end
    }

    /// Session close time for the given exchange/date, accounting for MCX's
    /// seasonal shift. Used by the EOD monitor to derive its trigger window.
    pub fn session_close(&self, exchange: Exchange, date: NaiveDate) -> Option<NaiveTime> {
        let end = match exchange {
            Exchange::Nfo => self.nse_close(date),
            Exchange::Mcx => self.mcx_close(date),
        };
        parse_time(&end)
    }

    pub fn is_holiday(&self, exchange: Exchange, date: NaiveDate) -> bool {
        match exchange {
            Exchange::Nfo => self.nse_holidays.contains(&date),
            Exchange::Mcx => self.mcx_holidays.contains(&date),
        }
    }

    /// MCX closes later in winter (Nov-Feb) than summer.
    fn mcx_close(&self, date: NaiveDate) -> String {
        if (11..=12).contains(&date.month()) || (1..=2).contains(&date.month()) {
            self.hours.mcx_winter_close.clone()
        } else {
            self.hours.mcx_summer_close.clone()
        }
    }

    fn nse_close(&self, _date: NaiveDate) -> String {
        self.hours.nse_end.clone()
    }
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    let (h, m) = s.split_once(':')?;
    NaiveTime::from_hms_opt(h.parse().ok()?, m.parse().ok()?, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn calendar() -> MarketCalendar {
        MarketCalendar::new(
            MarketHoursEnvConfig {
                nse_start: "09:15".to_string(),
                nse_end: "15:30".to_string(),
                mcx_start: "09:00".to_string(),
                mcx_end: "23:30".to_string(),
                mcx_summer_close: "23:30".to_string(),
                mcx_winter_close: "23:55".to_string(),
            },
            vec![NaiveDate::from_ymd_opt(2026, 8, 15).unwrap()],
            vec![],
        )
    }

    #[test]
    fn weekend_is_always_closed() {
        let cal = calendar();
        // 2026-08-01 is a Saturday.
        let sat = Utc.with_ymd_and_hms(2026, 8, 1, 10, 0, 0).unwrap();
        assert!(!cal.is_open(Exchange::Nfo, sat));
    }

    #[test]
    fn holiday_blocks_even_in_session_window() {
        let cal = calendar();
        let holiday = Utc.with_ymd_and_hms(2026, 8, 15, 10, 0, 0).unwrap();
        assert!(!cal.is_open(Exchange::Nfo, holiday));
    }

    #[test]
    fn within_session_window_is_open() {
        let cal = calendar();
        let during = Utc.with_ymd_and_hms(2026, 8, 17, 10, 0, 0).unwrap();
        assert!(cal.is_open(Exchange::Nfo, during));
    }

    #[test]
    fn session_close_reflects_mcx_season() {
        let cal = calendar();
        let winter = NaiveDate::from_ymd_opt(2026, 12, 10).unwrap();
        let summer = NaiveDate::from_ymd_opt(2026, 6, 10).unwrap();
        assert_eq!(cal.session_close(Exchange::Mcx, winter), NaiveTime::from_hms_opt(23, 55, 0));
        assert_eq!(cal.session_close(Exchange::Mcx, summer), NaiveTime::from_hms_opt(23, 30, 0));
    }

    #[test]
    fn mcx_closes_later_in_winter() {
        let cal = calendar();
        let winter_evening = Utc.with_ymd_and_hms(2026, 12, 10, 23, 40, 0).unwrap();
        assert!(cal.is_open(Exchange::Mcx, winter_evening));
        let summer_evening = Utc.with_ymd_and_hms(2026, 6, 10, 23, 40, 0).unwrap();
        assert!(!cal.is_open(Exchange::Mcx, summer_evening));
    }
}
