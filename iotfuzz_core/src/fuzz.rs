/// Contains the fuzzing session which drives one target through all iterations
pub mod session;

/// Contains all statistical data collected by a fuzzing session.
pub mod stats;
