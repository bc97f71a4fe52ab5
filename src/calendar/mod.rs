pub mod overrides;
pub mod pattern;
pub mod synth;

pub use overrides::{BankHolidays, OverrideError, SchoolTerms};
pub use pattern::{BankHolidayRule, ExceptionKind, OperatingPattern, SchoolTermRule, WeekdayMask};
pub use synth::{CalendarSignature, CalendarSynthesizer, ServiceCalendar, ServiceId};
