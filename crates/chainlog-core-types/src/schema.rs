//! Field keys and event names of the structured log stream
//!
//! Every operation boundary is one event carrying `op` and `event`; the
//! values below are what log consumers and the test capture match on.

pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_ERR_CODE: &str = "err_code";

pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
