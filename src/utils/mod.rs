pub(crate) mod retry;
pub(crate) mod truncate;

pub(crate) use retry::retry_with_backoff;
pub(crate) use truncate::truncate_for_log;
