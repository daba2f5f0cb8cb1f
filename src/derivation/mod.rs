pub mod enrich;
pub mod insight;

pub use enrich::derive;
pub use insight::summarize;
