//! Statistical helpers.
//!
//! - [`binomial`]: exact binomial CDF and quantile used by filter sizing and
//!   the containment lower bound
//! - [`window`]: MashMap sketch/window size estimation for the refinement step

pub mod binomial;
pub mod window;
