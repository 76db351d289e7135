//! The three processing kinds.

pub mod filtering;
pub mod outliers;
pub mod resampling;

pub use filtering::{savgol_window, FilterParams};
pub use outliers::OutlierParams;
pub use resampling::ResamplingParams;
