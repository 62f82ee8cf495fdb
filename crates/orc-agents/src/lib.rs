pub mod common;
pub mod emergency;
pub mod router;
pub mod sales;
pub mod schedule;
pub mod support;

pub use emergency::{EmergencyHandler, EmergencyInput, EmergencyOutput};
pub use router::{RouterHandler, RouterInput, RouterOutput};
pub use sales::{SalesHandler, SalesInput, SalesOutput};
pub use schedule::{ScheduleHandler, ScheduleInput, ScheduleOutput};
pub use support::{SupportHandler, SupportInput, SupportOutput};
