pub mod blueprints;
pub mod builder;
pub mod drafts;
pub mod runs;
