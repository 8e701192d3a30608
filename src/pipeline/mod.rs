//! Pipeline stages shared by the Convert and Compare flows.
//!
//! Each submodule implements exactly one step.
//!
//! ## Data Flow
//!
//! ```text
//! AutomationJob ──▶ script ──▶ supervise ──▶ classify ──▶ ClassifiedResult
//!                     ▲                          │
//!                     └──── remediate ◀──────────┘   (missing fonts, once)
//! ```
//!
//! 0. [`input`]: validate documents and PDFs before anything launches
//! 1. [`script`]: generate ExtendScript / AppleScript for the job; pure
//! 2. [`supervise`]: run it under a timeout, capture output, clean up
//! 3. [`classify`]: turn raw output into a typed result; rules in [`markers`]
//! 4. [`remediate`]: acquire and install missing fonts before the retry
//! 5. [`discover`]: find the report Acrobat saved (Compare only)

pub mod classify;
pub mod discover;
pub mod input;
pub mod markers;
pub mod remediate;
pub mod script;
pub mod supervise;
