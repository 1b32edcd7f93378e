//! Secret masking.
//!
//! Credentials from the configuration (admin and database root passwords)
//! are passed to collaborator commands verbatim, but must never reach the
//! terminal, logs or reports. [`OutputMasker`] scrubs them from any text
//! before it is shown.

pub mod mask;

pub use mask::OutputMasker;
