pub mod controller;
pub mod packet;
