pub mod classifier;
pub mod prompt;
pub mod response;
pub mod session;

pub use classifier::WasteClassifier;
pub use session::{SessionStore, SessionView};
