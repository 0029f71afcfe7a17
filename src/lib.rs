pub mod config;
pub mod editor;
pub mod engine;
pub mod jitter;
pub mod machine;
pub mod model;
pub mod planner;
pub mod presets;
pub mod scheduler;
pub mod scroll_spy;
pub mod sections;
pub mod sim;
pub mod trace;
