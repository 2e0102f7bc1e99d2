#![forbid(unsafe_code)]

pub mod calendar;
pub mod error;
pub mod model;
pub mod progress;
pub mod time;

pub use calendar::{CalendarDate, DateError, WeekWindow};
pub use error::Error;
pub use progress::{WeeklyProgress, weekly_progress};
pub use time::Clock;
