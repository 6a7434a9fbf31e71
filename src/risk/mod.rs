pub mod sizer;

pub use sizer::{RiskSizer, RiskStats};
