//! Protocol version implementations.

pub mod v1_0;
