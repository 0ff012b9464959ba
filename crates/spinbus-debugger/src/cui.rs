pub mod fault;
pub mod notes;
pub mod play;
pub mod sync;
