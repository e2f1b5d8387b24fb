pub mod sanitization;
pub mod subscriber;

pub use sanitization::*;
pub use subscriber::*;
