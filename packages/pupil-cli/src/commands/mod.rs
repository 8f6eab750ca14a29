pub mod behavior;
pub mod inspect;
pub mod process;
pub mod subjects;
