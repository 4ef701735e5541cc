// src/handlers/mod.rs

pub mod auth;
pub mod enrollment;
pub mod pilot;
pub mod quiz;
pub mod schedule;
