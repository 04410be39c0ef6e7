use chrono::{DateTime, Datelike, Duration, FixedOffset, TimeZone};

/// Daily run window in local (KST) hours, mirroring a cron trigger like
/// `hour='8-17/3'`: ticks at start, start+interval, ... up to end, at
/// minute zero.
#[derive(Debug, Clone)]
pub struct ScheduleWindow {
    pub start_hour: u32,
    pub end_hour: u32,
    pub interval_hours: u32,
}

impl Default for ScheduleWindow {
    fn default() -> Self {
        Self {
            start_hour: 8,
            end_hour: 17,
            interval_hours: 3,
        }
    }
}

impl ScheduleWindow {
    pub fn from_env() -> Self {
        let mut out = Self::default();

        if let Ok(s) = std::env::var("SCHEDULE_START_HOUR") {
            if let Ok(n) = s.parse::<u32>() {
                out.start_hour = n.min(23);
            }
        }

        if let Ok(s) = std::env::var("SCHEDULE_END_HOUR") {
            if let Ok(n) = s.parse::<u32>() {
                out.end_hour = n.min(23);
            }
        }

        if let Ok(s) = std::env::var("SCHEDULE_INTERVAL_HOURS") {
            if let Ok(n) = s.parse::<u32>() {
                out.interval_hours = n.max(1);
            }
        }

        if out.end_hour < out.start_hour {
            out.end_hour = out.start_hour;
        }

        out
    }
}

/// First tick strictly after `now`. A time on a tick boundary waits for the
/// next one, so a run never fires twice for the same tick.
pub fn next_tick(window: &ScheduleWindow, now: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    let offset = *now.offset();

    let mut hour = window.start_hour;
    while hour <= window.end_hour {
        if let Some(candidate) = offset
            .with_ymd_and_hms(
                now.date_naive().year(),
                now.date_naive().month(),
                now.date_naive().day(),
                hour,
                0,
                0,
            )
            .single()
        {
            if candidate > now {
                return candidate;
            }
        }
        hour += window.interval_hours;
    }

    // Past today's window: first tick tomorrow.
    let tomorrow = now.date_naive() + Duration::days(1);
    offset
        .with_ymd_and_hms(
            tomorrow.year(),
            tomorrow.month(),
            tomorrow.day(),
            window.start_hour,
            0,
            0,
        )
        .single()
        .unwrap_or(now + Duration::hours(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kst(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(9 * 3600)
            .unwrap()
            .with_ymd_and_hms(y, mo, d, h, mi, 0)
            .unwrap()
    }

    #[test]
    fn before_window_waits_for_first_tick() {
        let next = next_tick(&ScheduleWindow::default(), kst(2026, 3, 10, 6, 15));
        assert_eq!(next, kst(2026, 3, 10, 8, 0));
    }

    #[test]
    fn mid_window_picks_next_tick() {
        let next = next_tick(&ScheduleWindow::default(), kst(2026, 3, 10, 9, 30));
        assert_eq!(next, kst(2026, 3, 10, 11, 0));
    }

    #[test]
    fn exact_tick_time_moves_to_following_tick() {
        let next = next_tick(&ScheduleWindow::default(), kst(2026, 3, 10, 11, 0));
        assert_eq!(next, kst(2026, 3, 10, 14, 0));
    }

    #[test]
    fn after_window_rolls_to_tomorrow() {
        let next = next_tick(&ScheduleWindow::default(), kst(2026, 3, 10, 17, 30));
        assert_eq!(next, kst(2026, 3, 11, 8, 0));
    }

    #[test]
    fn custom_window_ticks_at_interval() {
        let window = ScheduleWindow {
            start_hour: 9,
            end_hour: 18,
            interval_hours: 4,
        };
        // Ticks at 9, 13, 17.
        assert_eq!(next_tick(&window, kst(2026, 3, 10, 12, 0)), kst(2026, 3, 10, 13, 0));
        assert_eq!(next_tick(&window, kst(2026, 3, 10, 16, 59)), kst(2026, 3, 10, 17, 0));
        assert_eq!(next_tick(&window, kst(2026, 3, 10, 17, 1)), kst(2026, 3, 11, 9, 0));
    }
}
