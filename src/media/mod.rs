pub mod image;
pub mod narration;
pub mod tool;
pub mod video;

pub use tool::ToolError;
