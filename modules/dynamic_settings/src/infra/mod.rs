//! Infrastructure layer - backing store adapters

pub mod storage;
