//! Triangulation of wall faces, used to measure how buildable they are.

mod triangulate;

pub use triangulate::{triangulate_polygon, Triangle};
