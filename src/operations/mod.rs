pub mod boolean;
pub mod healing;
pub mod intersection;
pub mod offset;
pub mod recovery;
pub mod simplify;
pub mod tolerance;
pub mod validate;
