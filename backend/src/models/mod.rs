// src/models/mod.rs

pub mod attempt;
pub mod option;
pub mod pack_session;
pub mod page;
pub mod point;
