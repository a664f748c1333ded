//! Cell formatting that affects computed values

mod number_format;

pub use number_format::NumberFormat;
