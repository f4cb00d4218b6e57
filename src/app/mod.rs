mod update;

pub use update::{Decision, RESPONSE_TIMEOUT, decide, fetch_and_install};
