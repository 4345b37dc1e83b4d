//! Core library for attachto: keeps a host application's command registry
//! synchronized with a declarative list of debugger launch targets and
//! dispatches host invocations back to the right target's attach action.

pub mod attach;
pub mod command;
pub mod dispatch;
pub mod host;
pub mod reconcile;
pub mod session;
pub mod settings;
