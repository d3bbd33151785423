pub mod detection;
pub mod imaging;
pub mod pipeline;
pub mod shared;
pub mod swapping;
