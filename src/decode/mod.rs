pub mod ppm;

pub use ppm::{decode_ppm, load_ppm, PpmImage};
