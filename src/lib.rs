// THEORY:
// This file is the main entry point for the `backdrop_sprites` library crate.
// It decorates a photograph with randomly chosen sprites that land only on the
// background: a segmentation service labels every pixel, a pure classifier
// turns that signal into a category mask, and a bounded random search places
// sprites on background cells without letting them collide.
//
// The `pipeline::OverlaySession` is the high-level interface. The algorithmic
// layers (`core_modules`) are pure and testable in isolation, the `adapters`
// hold the two network boundaries, and `config`/`error` carry the ambient
// plumbing shared by both.

pub mod adapters;
pub mod config;
pub mod core_modules;
pub mod error;
pub mod pipeline;
