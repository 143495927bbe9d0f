pub mod board;
pub mod sexp;

// Re-export for convenience
pub use board::{Board, BoardError, NetTable};
pub use sexp::{ParseError, SExp, SExpParser};
