//! Safety and cleanup
//!
//! Run layout bootstrap and the recursive output reaper.

pub mod layout;
pub mod safe_cleanup;
