//! Operator implementations behind [`ObservableExt`](crate::observable::ObservableExt).

pub mod combine_latest;
pub mod concat;
pub mod exhaust_all;
pub mod filter;
pub mod group_by;
pub mod map;
pub mod merge_all;
pub mod observe_on;
pub mod ref_count;
pub mod retry;
pub mod retry_when;
pub mod single;
pub mod subscribe_on;
pub mod switch_latest;
pub mod take;
pub mod timeout;
pub mod zip;
