//! Log a resolved exception exactly once, however often it is re-wrapped.

use crate::exception::{MessagingException, INFO_LOCATION_KEY};

/// Emit `exception` at error level unless it was logged before, then set
/// its `logged` flag. Returns `true` if this call logged it.
pub fn log_once(exception: &MessagingException) -> bool {
    if exception.is_already_logged() {
        tracing::trace!(exception = %exception, "already logged, skipping");
        return false;
    }

    let event = exception.event();
    let location = exception
        .info_value(INFO_LOCATION_KEY)
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();

    match event.error() {
        Some(error) => tracing::error!(
            error_type = %error.error_type(),
            event_id = event.id(),
            location = %location,
            detail = error.detailed_description(),
            "{}",
            error.description()
        ),
        None => tracing::error!(
            event_id = event.id(),
            location = %location,
            "{}",
            exception
        ),
    }

    exception.mark_logged();
    true
}
