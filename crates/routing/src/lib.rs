//! Support desk conversation routing.
//!
//! Inbound updates enter through [`Dispatcher`], which picks one of:
//! the intake flow that opens tickets, the relay between a user and the
//! operator holding their ASSIGNED ticket, or the operator controls
//! (claim, finish, history).

pub mod dispatcher;
pub mod error;
pub mod history;
pub mod intake;
pub mod keyboards;
pub mod lifecycle;
pub mod recorder;
pub mod relay;
pub mod texts;

#[cfg(test)]
mod testing;

pub use {
    dispatcher::{DeskConfig, Dispatcher},
    error::{Error, Result},
    history::{HistoryReconstructor, ReplayEvent, ReplayReport},
    intake::{E164Normalizer, Intake, IntakeSettings, PhoneNormalizer},
    keyboards::CallbackAction,
    lifecycle::TicketLifecycle,
    recorder::{MessageRecorder, Recorded},
    relay::{MessageRelay, RelayOutcome, Route},
};
