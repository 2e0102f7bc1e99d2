mod completion;
mod ids;
mod key;
mod plan;

pub use completion::CompletionMap;
pub use ids::{IdError, PLAN_SENTINEL, PlanId, SessionId, SessionRef};
pub use key::{CompletionKey, KeyError};
pub use plan::{
    DayOccurrences, PlanSession, SessionOccurrence, WeeklySchedule, WorkoutPlan, expand_week,
    parse_weekday_code,
};
