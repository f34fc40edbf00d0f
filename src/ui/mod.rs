//! Terminal output helpers
//!
//! Styled with `console`; spinners come from `indicatif`. Everything falls
//! back to plain lines when stdout is not a terminal or a CI variable is set,
//! so piped output and tests stay readable.

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{heading, key_value, status_label, step_error, step_info, step_ok, step_warn};
pub use progress::WaitSpinner;
