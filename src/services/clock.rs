use chrono::NaiveDateTime;

/// Injectable time source so "has the appointment time passed" and the
/// cancellation-window comparison are testable without the wall clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Utc::now().naive_utc()
    }
}
