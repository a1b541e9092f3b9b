//! Maps `Box<dyn Error>` from trait boundaries to typed `GaugeError`.
//!
//! The traits in `lasergauge_traits` use `Box<dyn Error + Send + Sync>`; this
//! module converts those to our typed error enum, with an optional
//! feature-gated path for `lasergauge_hardware::HwError` downcasting.

use crate::error::GaugeError;

/// Map a trait-boundary error to a typed `GaugeError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> GaugeError {
    #[cfg(feature = "hardware-errors")]
    {
        use lasergauge_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout { .. } => GaugeError::Timeout,
                other => GaugeError::Hardware(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        GaugeError::Timeout
    } else {
        GaugeError::Hardware(s)
    }
}

/// Convenience for `?`-chains on collaborator results.
pub(crate) fn hw<T>(r: Result<T, lasergauge_traits::BoxError>) -> crate::error::Result<T> {
    r.map_err(|e| map_hw_error(e.as_ref()).report())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_text_maps_to_timeout() {
        let e = std::io::Error::other("camera Timeout after 50ms");
        assert_eq!(map_hw_error(&e), GaugeError::Timeout);
    }

    #[test]
    fn other_text_maps_to_hardware() {
        let e = std::io::Error::other("bus fault");
        assert_eq!(map_hw_error(&e), GaugeError::Hardware("bus fault".into()));
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn typed_hw_timeout_is_downcast() {
        let e = lasergauge_hardware::error::HwError::Timeout { waited_ms: 20 };
        assert_eq!(map_hw_error(&e), GaugeError::Timeout);
    }
}
