// src/services/mod.rs

pub mod attempts;
pub mod grading;
pub mod notifier;
pub mod pilot_deletion;
pub mod scheduling;
