use anyhow::Result;

/// Everything in chronify runs cooperatively on one thread, the same way the UI event loop
/// would drive it.
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
