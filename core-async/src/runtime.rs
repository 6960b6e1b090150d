//! Runtime utilities wrapping Tokio's runtime builder.

pub use tokio::runtime::{Builder, Handle, Runtime};

/// Runs the provided future to completion on a fresh current-thread runtime.
///
/// Used by the `#[core_async::test]` and `#[core_async::main]` attributes.
///
/// # Panics
///
/// Panics when the runtime cannot be constructed (I/O driver or timer could
/// not be initialised). There is nothing sensible a test or entry point can
/// do in that situation.
pub fn block_on<F>(future: F) -> F::Output
where
    F: std::future::Future,
{
    Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("core_async::runtime::block_on: failed to build Tokio runtime")
        .block_on(future)
}
