mod update;

pub use update::UpdateReporter;
