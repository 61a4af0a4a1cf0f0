pub mod describe;
pub mod t_test;
