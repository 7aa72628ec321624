//! Result type alias for trialsite
//!
//! This module provides a convenient Result type alias that uses TrialError
//! as the error type.

use super::errors::TrialError;

/// Result type alias for trialsite operations
///
/// # Examples
///
/// ```
/// use trialsite::domain::result::Result;
/// use trialsite::domain::errors::TrialError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(TrialError::Validation("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, TrialError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_with_question_mark() -> Result<()> {
        fn inner() -> Result<i32> {
            Ok(42)
        }

        let value = inner()?;
        assert_eq!(value, 42);
        Ok(())
    }

    #[test]
    fn test_result_err() {
        let result: Result<i32> = Err(TrialError::Validation("test error".to_string()));
        assert!(result.is_err());
    }
}
