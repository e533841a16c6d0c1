//! Exchange adapters
//!
//! Adapters normalize venue traffic into the wire types of `messages` and
//! publish it through `transport`.

pub mod deribit;
