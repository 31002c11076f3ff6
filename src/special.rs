//! Special functions for line shapes and layer transmission.

mod expint;
mod faddeeva;

pub use self::expint::{e1, trans2e3};
pub use self::faddeeva::{imwofz, rewofz, wofz, wofz_batch, wofz_checked, HalfPlanePolicy};
