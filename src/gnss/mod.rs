
/// Functionality shared by all signals: the acquisition engine and its collaborators
pub mod common;

pub mod gps_l1_ca;
