use std::sync::Arc;

use tracing::debug;

use crate::models::day::Day;

/// Source of "today".
pub trait Clock: Send + Sync {
    fn today(&self) -> Day;
}

/// Reads the wall clock in the system time zone on every call.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> Day {
        Day::today()
    }
}

/// The day currently being viewed. Only the latest position is kept.
pub struct DayCursor {
    current: Day,
    clock: Arc<dyn Clock>,
}

impl DayCursor {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let current = clock.today();
        Self { current, clock }
    }

    pub fn current(&self) -> Day {
        self.current
    }

    pub fn today(&self) -> Day {
        self.clock.today()
    }

    pub fn go_to_next_day(&mut self) -> Day {
        self.jump_to(self.current.add_days(1))
    }

    pub fn go_to_previous_day(&mut self) -> Day {
        self.jump_to(self.current.sub_days(1))
    }

    pub fn go_to_today(&mut self) -> Day {
        let today = self.clock.today();
        self.jump_to(today)
    }

    pub fn jump_to(&mut self, day: Day) -> Day {
        debug!(from = %self.current, to = %day, "Moving day cursor");
        self.current = day;
        self.current
    }
}
