pub mod audit;
pub mod keyword;
pub mod note;
pub mod supervisor;

pub use audit::*;
pub use keyword::*;
pub use note::*;
pub use supervisor::*;
