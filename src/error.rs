#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The strategy could not produce storage for the request.
    #[error("allocation of {bytes} bytes aligned to {align} failed")]
    Exhausted { bytes: usize, align: usize },

    /// Byte-count arithmetic overflowed before any strategy was consulted.
    #[error("allocation size overflow: {count} x {size} bytes")]
    Overflow { count: usize, size: usize },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
