// Error handling macros
// Provides macros for simplified error handling

/// Return early with an error if a condition is not satisfied
///
/// The error expression is converted with `Into`, so any domain error can be
/// returned from a function whose error type wraps it.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $error:expr) => {
        if !($cond) {
            return Err(::core::convert::Into::into($error));
        }
    };
}

/// Bail early with an error
#[macro_export]
macro_rules! bail {
    ($error:expr) => {
        return Err(::core::convert::Into::into($error))
    };
}
