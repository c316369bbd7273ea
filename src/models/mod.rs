pub mod alert;
pub mod checkin;
pub mod enrollment;
pub mod enums;
pub mod parameter;

pub use alert::EscalationAlert;
pub use checkin::CheckinRecord;
pub use enrollment::{EmergencyContact, Enrollment, EnrollmentPatch};
pub use parameter::{ParamValue, ParameterDef};
