//! Pipeline stages for visual content resolution.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and the tool entry points in [`crate::tools`] are just a sequence of
//! calls.
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ input ──▶ content ──┬──▶ render ──┐
//! (kind)    (bytes)   (sniff)   │  (pdfium)   ├──▶ normalize ──▶ encode
//!                               └──▶ decode ──┘   (crop, fit)    (compress)
//! ```
//!
//! 1. [`source`]: decide whether a reference is a path, URL, or inline data
//! 2. [`input`]: fetch the bytes with size limits and an optional
//!    domain allow-list
//! 3. [`content`]: document or image, by magic bytes first
//! 4. [`render`]: rasterise one PDF page; runs in `spawn_blocking`
//!    because pdfium is not async-safe ([`engine`] finds the library)
//! 5. [`normalize`]: crop to the [`region`], then downscale to fit
//! 6. [`encode`]: re-encode in the output format

pub mod content;
pub mod encode;
pub mod engine;
pub mod input;
pub mod normalize;
pub mod region;
pub mod render;
pub mod source;
