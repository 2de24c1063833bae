//! Text passes that keep track of where every piece of their output came from.

mod conditionals;
mod replacer;
mod slicer;

pub use conditionals::{process_conditionals, Conditioned};
pub use replacer::replace_words;
pub use slicer::{slice_replace, Slice, Sliced};
