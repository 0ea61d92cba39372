pub mod attempt;
pub mod award;
pub mod pack_session;
