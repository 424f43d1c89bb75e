//! Unrecoverable failures.

/// Logs and aborts the process.
///
/// Used when an arithmetic invariant breaks or a pool runs out of slots.
#[cold]
pub(crate) fn fatal(what: std::fmt::Arguments<'_>) -> ! {
    log::error!("fatal: {}", what);
    std::process::abort()
}
