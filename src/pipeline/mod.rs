//! Pipeline stages for presentation-to-PDF conversion.
//!
//! Each submodule implements one step. The browser-facing stages talk to the
//! page only through [`session::PresentationPage`], so they can be tested
//! against a scripted page.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ session ──▶ inspect ──▶ plan ──▶ capture ──▶ assemble
//! (path/URL) (load)    (probes)   (steps)  (snapshots)  (lopdf)
//! ```
//!
//! 1. [`input`]    — validate the path or URL and turn it into a loadable URL
//! 2. [`session`]  — start a headless browser and load the document until
//!    the network is idle
//! 3. [`inspect`]  — detect the authoring framework and read its structure
//! 4. [`plan`]     — expand the structure into ordered navigation targets
//! 5. [`capture`]  — navigate, cold-reload, settle and snapshot each target
//! 6. [`assemble`] — one PDF page per snapshot; runs in `spawn_blocking`

pub mod assemble;
pub mod capture;
pub mod input;
pub mod inspect;
pub mod plan;
pub mod session;
