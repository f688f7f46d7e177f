pub mod check;
pub mod mutate;
pub mod run;
pub mod util;
