//! Capacity-safe submissions against studies with a fixed number of places.
//!
//! [`Allocator`] is the only way to create a [`Submission`]. It coordinates
//! concurrent callers, in this process or any other, purely through the
//! uniqueness constraints of its [`Store`].

pub mod allocator;
pub mod error;
pub mod memory;
pub mod models;
pub mod store;

pub use allocator::{Allocator, RetryPolicy};
pub use error::{
    ConstraintViolation, InsertError, InsertStudyError, StoreError, StudyError, SubmissionError,
};
pub use memory::MemoryStore;
pub use models::{NewStudy, Study, StudyId, Submission, SubmissionCandidate, SubmissionId};
pub use store::Store;
