//! Context handling for each request: history assembly and size estimates.

pub mod assembler;
pub mod token;

pub use assembler::{AssembledHistory, HistoryAssembler, SideChannelContext};
pub use token::{ContextBreakdown, SizeFlag};
