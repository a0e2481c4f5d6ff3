pub mod utils_time;
