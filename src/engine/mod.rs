pub mod ordering;
pub mod transitions;
