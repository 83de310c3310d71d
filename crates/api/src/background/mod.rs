//! Background tasks spawned at startup.

pub mod health;
