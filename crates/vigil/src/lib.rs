//! Top-level facade crate for vigil.
//!
//! Re-exports the core metric primitives and the monitor library so hosts can
//! depend on a single crate.

pub mod core {
    pub use vigil_core::*;
}

pub mod monitor {
    pub use vigil_monitor::*;
}
