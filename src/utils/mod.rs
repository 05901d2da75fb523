pub mod sequence_reset;
pub mod setting;
