pub mod ad_num_traits;
pub mod ad_ops;
