//! Private runtimes for the blocking entry points.

use tokio::runtime::{Builder, Handle, Runtime};

use crate::core::{Result, TroupeError};

/// Current-thread runtime for a synchronous caller.
///
/// Fails instead of panicking when the caller is already inside a runtime.
pub fn blocking_runtime() -> Result<Runtime> {
    if Handle::try_current().is_ok() {
        return Err(TroupeError::config(
            "blocking call made from inside an async runtime; await the async method instead",
        ));
    }
    Ok(Builder::new_current_thread().enable_all().build()?)
}
