/// Log-and-discard handling for best-effort results.
pub trait ResultOkLogExt<T, E> {
    /// Converts the result into an [`Option`], logging the error with
    /// `context` at error level.
    fn ok_log(self, context: &str) -> Option<T>;
}

impl<T, E> ResultOkLogExt<T, E> for std::result::Result<T, E>
where
    E: std::error::Error,
{
    fn ok_log(self, context: &str) -> Option<T> {
        match self {
            Ok(ok) => Some(ok),
            Err(err) => {
                log::error!("{context}: {err}");
                None
            }
        }
    }
}
