//! Serde support for records.
//!
//! A `StringRecord` serializes as a sequence of strings, the same shape as a
//! `Vec<String>`.

mod de;
mod ser;
