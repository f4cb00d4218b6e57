mod handler;

pub use handler::UpdateReporter;
