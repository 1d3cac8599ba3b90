pub mod chunking;
pub mod selection;

pub use chunking::{chunk_text, split_sentences};
pub use selection::{best_subset, select_evidences, Selection};
