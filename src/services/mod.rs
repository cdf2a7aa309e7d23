pub mod availability;
pub mod clock;
pub mod commission;
pub mod dispatch;
pub mod events;
pub mod lifecycle;
pub mod verification;
