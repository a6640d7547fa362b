//! Layer constructors.
//!
//! Each constructor returns a [Model](crate::Model) whose forward and
//! backward behaviour is implemented in the matching submodule.

pub mod chain;
pub mod affine;
pub mod relu;
pub mod lstm;
pub mod recurrent;

pub use chain::{ chain, chains };
pub use affine::affine;
pub use relu::relu;
pub use lstm::{ lstm, lstm_step };
pub use recurrent::recurrent;
