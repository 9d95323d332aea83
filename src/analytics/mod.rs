pub mod density_analyzer;
pub mod export;
pub mod highlight;
pub mod highlight_assembler;
pub mod intensity_classifier;
pub mod stream_analyzer;

pub use density_analyzer::*;
pub use export::*;
pub use highlight::*;
pub use highlight_assembler::*;
pub use intensity_classifier::*;
pub use stream_analyzer::*;
