pub mod annotation;

pub use annotation::{Annotation, Meta, Point, Rect};
