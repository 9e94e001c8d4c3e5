pub mod conversions;

pub use conversions::{integral_f64_to_i32, integral_f64_to_usize};
