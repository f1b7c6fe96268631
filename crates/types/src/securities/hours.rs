//! Venue trading calendars.
//!
//! Sessions are described per [`Venue`] as [`SessionRule`]s: a weekday
//! activation mask (Mon=0 .. Sun=6) plus open and close times in seconds
//! since local midnight (SSM) in the venue's time zone. `open_ssm <=
//! close_ssm` is a same-day session; `open_ssm > close_ssm` wraps past
//! midnight and closes the next local day. Comparisons against a close are
//! end-exclusive. Holiday dates suppress every session on that local date,
//! including wraps opened the previous day.
//!
//! All public APIs take UTC instants; the venue zone is only used internally
//! so DST transitions resolve correctly.
use crate::securities::symbols::Venue;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};
use chrono_tz::{America, Tz};

/// One schedule slice for a market session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionRule {
    /// Weekday activation mask (Mon=0 .. Sun=6).
    pub days: [bool; 7],
    /// Open time in seconds since local midnight.
    pub open_ssm: u32,
    /// Close time in seconds since local midnight (end-exclusive).
    pub close_ssm: u32,
}

impl SessionRule {
    fn weekdays(open_ssm: u32, close_ssm: u32) -> SessionRule {
        SessionRule {
            days: [true, true, true, true, true, false, false],
            open_ssm,
            close_ssm,
        }
    }
}

/// Which session set to consult when querying hours.
#[derive(Debug, Clone, Copy)]
pub enum SessionKind {
    Regular,
    Extended,
    Both,
}

/// Venue-level trading hours definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketHours {
    pub venue: Venue,
    /// Venue's local time zone, used to interpret the rules.
    pub tz: Tz,
    /// Primary trading sessions.
    pub regular: Vec<SessionRule>,
    /// Pre/post market and other non-regular sessions.
    pub extended: Vec<SessionRule>,
    /// Venue-local holiday dates.
    pub holidays: Vec<NaiveDate>,
}

impl MarketHours {
    #[inline]
    fn iter_rules(&self, kind: SessionKind) -> impl Iterator<Item = &SessionRule> {
        let (reg, ext) = match kind {
            SessionKind::Regular => (self.regular.len(), 0),
            SessionKind::Extended => (0, self.extended.len()),
            SessionKind::Both => (self.regular.len(), self.extended.len()),
        };
        self.regular.iter().take(reg).chain(self.extended.iter().take(ext))
    }

    /// True if **any** (regular or extended) session is open at `t`.
    pub fn is_open(&self, t: DateTime<Utc>) -> bool {
        self.is_open_with(t, SessionKind::Both)
    }

    /// True if a session of the requested kind is open at `t`.
    pub fn is_open_with(&self, t: DateTime<Utc>, kind: SessionKind) -> bool {
        let local = t.with_timezone(&self.tz);
        if self.holidays.iter().any(|d| *d == local.date_naive()) {
            return false;
        }
        let w_today = local.weekday().num_days_from_monday() as usize;
        let ssm = local.num_seconds_from_midnight();

        if self.iter_rules(kind).any(|r| {
            if !r.days[w_today] {
                return false;
            }
            if r.open_ssm <= r.close_ssm {
                ssm >= r.open_ssm && ssm < r.close_ssm
            } else {
                ssm >= r.open_ssm || ssm < r.close_ssm
            }
        }) {
            return true;
        }

        // Wrapped session opened yesterday, still inside before its close.
        let yday_date = local.date_naive() - Duration::days(1);
        if self.holidays.iter().any(|d| *d == yday_date) {
            return false;
        }
        let yday = yday_date.weekday().num_days_from_monday() as usize;
        self.iter_rules(kind)
            .any(|r| r.open_ssm > r.close_ssm && r.days[yday] && ssm < r.close_ssm)
    }

    pub fn is_open_regular(&self, t: DateTime<Utc>) -> bool {
        self.is_open_with(t, SessionKind::Regular)
    }

    pub fn is_open_extended(&self, t: DateTime<Utc>) -> bool {
        self.is_open_with(t, SessionKind::Extended)
    }
}

/// Build default trading hours per venue.
/// These are venue-level defaults; product-level calendars can be layered
/// later if required.
pub fn hours_for_venue(venue: Venue) -> MarketHours {
    match venue {
        // US equities: RTH 09:30-16:00 ET, pre 04:00-09:30, post 16:00-20:00.
        Venue::NYSE | Venue::NASDAQ => MarketHours {
            venue,
            tz: America::New_York,
            regular: vec![SessionRule::weekdays(9 * 3600 + 30 * 60, 16 * 3600)],
            extended: vec![
                SessionRule::weekdays(4 * 3600, 9 * 3600 + 30 * 60),
                SessionRule::weekdays(16 * 3600, 20 * 3600),
            ],
            holidays: vec![],
        },

        // Spot FX: continuous Sun 17:00 ET through Fri 17:00 ET, expressed
        // as same-day slices so no wrap bookkeeping is needed.
        Venue::FXCM => MarketHours {
            venue,
            tz: America::New_York,
            regular: vec![
                // Sunday reopen 17:00 to midnight
                SessionRule {
                    days: [false, false, false, false, false, false, true],
                    open_ssm: 17 * 3600,
                    close_ssm: 24 * 3600,
                },
                // Monday through Thursday around the clock
                SessionRule {
                    days: [true, true, true, true, false, false, false],
                    open_ssm: 0,
                    close_ssm: 24 * 3600,
                },
                // Friday until the 17:00 close
                SessionRule {
                    days: [false, false, false, false, true, false, false],
                    open_ssm: 0,
                    close_ssm: 17 * 3600,
                },
            ],
            extended: vec![],
            holidays: vec![],
        },

        Venue::SIM => MarketHours {
            venue,
            tz: chrono_tz::UTC,
            regular: vec![SessionRule {
                days: [true; 7],
                open_ssm: 0,
                close_ssm: 24 * 3600,
            }],
            extended: vec![],
            holidays: vec![],
        },
    }
}
