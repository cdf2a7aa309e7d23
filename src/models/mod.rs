pub mod actor;
pub mod booking;
pub mod certificate;
pub mod event;
pub mod professional;
pub mod service;

pub use actor::{Actor, Role};
pub use booking::{Booking, BookingStatus};
pub use certificate::{Certificate, CertificateStatus};
pub use event::WorkflowEvent;
pub use professional::{Professional, ProfessionalStatus};
pub use service::{ServiceOffering, ServiceStatus};
