// src/handlers/mod.rs

pub mod analytic;
pub mod attempt;
pub mod pack_session;
