//! Simulated classroom runner.
//!
//! Drives an owner and a set of students through a scripted lesson on the
//! deterministic [`roomsync_harness::Cluster`] and reports what happened.
//! The `roomsync-sim` binary wraps [`run_lesson`] with a command line.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod lesson;

pub use lesson::{
    DEFAULT_STUDENTS, LessonConfig, LessonError, LessonReport, run_lesson, student_id,
};
