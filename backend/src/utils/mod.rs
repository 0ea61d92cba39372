// src/utils/mod.rs

pub mod jwt;
pub mod locks;
pub mod retry;
