use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

/// Where the scheduler currently is in its cycle.
#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
	#[default]
	Idle,
	Ingesting,
	Building,
	Composing,
	Publishing,
	Sleeping,
	BackingOff,
	Stopped,
}

/// Observable snapshot of the scheduler, shared with the status endpoint.
#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStatus {
	pub phase: Phase,
	/// Cycles that ran to completion or failure.
	pub cycles: u64,
	pub published: u64,
	pub failed: u64,
	pub consecutive_failures: u32,
	pub last_message: Option<String>,
	pub last_error: Option<String>,
}

pub type SharedStatus = Arc<Mutex<SchedulerStatus>>;

/// Applies `f` to the shared status, recovering from a poisoned lock.
pub(crate) fn update_status(status: &SharedStatus, f: impl FnOnce(&mut SchedulerStatus)) {
	let mut guard = status.lock().unwrap_or_else(PoisonError::into_inner);
	f(&mut guard);
}

/// Copies the current status out of the lock.
pub fn read_status(status: &SharedStatus) -> SchedulerStatus {
	status.lock().unwrap_or_else(PoisonError::into_inner).clone()
}
