//! Read side of the collector: probing the platform, normalizing what it reports and folding
//! samples into intervals.

pub mod collector;
pub mod idle;
pub mod normalize;
pub mod probe;
pub mod runner;
pub mod segmenter;
