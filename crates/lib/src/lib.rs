//! hermit-lib: out-of-tree ZMK firmware builds in a throwaway container
//!
//! The pipeline runs one way:
//! - `shield`: find the shield's name and whether it is split
//! - `board`: a board id, or an out-of-tree board directory to mount
//! - `plan`: one `BuildTarget` per half, named before anything runs
//! - `execute`: render and run each target, streaming its output to a sink
//! - `collect`: copy successful artifacts to the destination
//! - `container`: mounts, image, and the container lifecycle around it all
//!
//! `behavior` patches out-of-tree behaviors into the firmware tree for the
//! length of a run. `run::run` ties everything together.

pub mod behavior;
pub mod board;
pub mod collect;
pub mod consts;
pub mod container;
pub mod execute;
pub mod plan;
pub mod platform;
pub mod run;
pub mod shield;
