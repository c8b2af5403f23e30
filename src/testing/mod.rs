//! Testing utilities for crabwatch
//!
//! Synthetic scenes, in-memory sources, and scripted detectors for driving
//! the pipeline without a camera.

pub mod synthetic_data;

pub use synthetic_data::{
    synthetic_scene, SceneObject, ScriptedDetector, SyntheticSource, OBJECT_LEVEL,
};
