pub mod control_loops;
pub mod integrator;
pub mod pid;
