//! Document rendering: configuration snapshot in, OpenSLO YAML text out.

pub mod yaml;

pub use yaml::render_document;
