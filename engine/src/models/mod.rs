//! Domain models: patients, decisions, events, and the patient state store

pub mod decision;
pub mod event;
pub mod patient;
pub mod state;

pub use decision::{Action, Decision, ReviewReason, RuleContribution, WaitReason};
pub use event::{Event, EventLog};
pub use patient::{AttributeValue, HistoryAction, HistoryEntry, Patient, PatientError};
pub use state::{PatientStore, PatientView, StoreError, SystemView};
