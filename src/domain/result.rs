//! Result type alias for photobundle

use super::errors::BundleError;

/// Result type alias for photobundle operations
///
/// # Examples
///
/// ```
/// use photobundle::domain::result::Result;
/// use photobundle::domain::errors::BundleError;
///
/// fn failing_function() -> Result<()> {
///     Err(BundleError::Validation("Invalid input".to_string()))
/// }
///
/// assert!(failing_function().is_err());
/// ```
pub type Result<T> = std::result::Result<T, BundleError>;
