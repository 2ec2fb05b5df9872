pub mod fake_timer;
pub mod sim_counter;
