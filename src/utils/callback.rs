use std::panic::{self, AssertUnwindSafe};

use log::error;

/// Runs a consumer callback. Errors and panics are logged, never propagated.
pub fn invoke_guarded<F>(label: &str, callback: F) -> bool
where
    F: FnOnce() -> anyhow::Result<()>,
{
    match panic::catch_unwind(AssertUnwindSafe(callback)) {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            error!("{label} callback failed: {err:#}");
            false
        }
        Err(_) => {
            error!("{label} callback panicked");
            false
        }
    }
}
