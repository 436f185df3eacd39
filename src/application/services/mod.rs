//! Application services

pub mod export;
pub mod frame;
pub mod loader;
pub mod variables;

pub use export::{ExportFormat, ExportService};
pub use frame::{
    draw, get_tree_info, set_alias, tree_to_frame, tree_to_frame_selected, ColumnMask,
    DrawResult, FrameOptions, TreeInfo,
};
pub use loader::TreeLoader;
pub use variables::get_and_test_variable_list;
