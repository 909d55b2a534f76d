//! Maps `Box<dyn Error>` from the link trait boundary to typed `RgaError`.
//!
//! `rgams_traits::SerialLink` uses `Box<dyn Error + Send + Sync>` so any
//! transport can plug in; this module converts those to our typed error enum,
//! with an optional feature-gated path for `rgams_hardware::HwError`.

use crate::error::RgaError;

/// Map a trait-boundary error to a typed `RgaError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_link_error(e: &(dyn std::error::Error + 'static)) -> RgaError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<rgams_hardware::error::HwError>() {
            return match hw {
                rgams_hardware::error::HwError::Timeout => {
                    RgaError::Timeout("serial read".to_string())
                }
                other => RgaError::Link(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    let lower = s.to_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        RgaError::Timeout(s)
    } else {
        RgaError::Link(s)
    }
}

/// Wrap a boxed link error into a report carrying the typed error.
pub(crate) fn link_report(e: rgams_traits::BoxError) -> eyre::Report {
    eyre::Report::new(map_link_error(&*e))
}
