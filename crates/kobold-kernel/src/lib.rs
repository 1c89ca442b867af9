//! `kobold-kernel` – State & Rules
//!
//! Pure, synchronous robot state handling.  Nothing here performs I/O.
//!
//! # Modules
//!
//! - [`capability_manager`] – [`capabilities_for`][capability_manager::capabilities_for]:
//!   derives the allowed action set from a
//!   [`RobotState`][kobold_types::RobotState].
//! - [`state_machine`] – [`RobotStateMachine`][state_machine::RobotStateMachine]:
//!   validates every [`ActionIntent`][kobold_types::ActionIntent] against
//!   that action set, commits accepted commands and merges vendor status
//!   reports.

pub mod capability_manager;
pub mod state_machine;

pub use capability_manager::capabilities_for;
pub use state_machine::{Command, RobotStateMachine};
