pub mod auth;
pub mod patient;
pub mod realtime_event;
pub mod record;
pub mod todo;

pub use auth::{AuthResponse, AuthSession, AuthUser, StoredAuth};
pub use patient::{NewPatient, Patient, PatientChanges, PATIENT_NAME_MAX_LEN};
pub use realtime_event::RealtimeEvent;
pub use record::{Fields, Paged, Record, RecordPage};
pub use todo::{Todo, TODO_TITLE_MAX_LEN};
