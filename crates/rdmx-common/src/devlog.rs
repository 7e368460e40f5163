// Logging macros that compile down to nothing unless the matching
// log-level-* feature is enabled, keeping conditionals and format
// strings out of the release artifact.

#[macro_export]
#[cfg(feature = "__log_enable_level_error")]
macro_rules! rdmx_error {
    () => {};
    ($($arg:tt)*) => {
        $crate::__log::error!($($arg)*);
    }
}

#[macro_export]
#[cfg(not(feature = "__log_enable_level_error"))]
macro_rules! rdmx_error {
    () => {};
    ($($arg:tt)*) => {}
}

#[macro_export]
#[cfg(feature = "__log_enable_level_warn")]
macro_rules! rdmx_warn {
    () => {};
    ($($arg:tt)*) => {
        $crate::__log::warn!($($arg)*);
    }
}

#[macro_export]
#[cfg(not(feature = "__log_enable_level_warn"))]
macro_rules! rdmx_warn {
    () => {};
    ($($arg:tt)*) => {}
}

#[macro_export]
#[cfg(feature = "__log_enable_level_info")]
macro_rules! rdmx_info {
    () => {};
    ($($arg:tt)*) => {
        $crate::__log::info!($($arg)*);
    }
}

#[macro_export]
#[cfg(not(feature = "__log_enable_level_info"))]
macro_rules! rdmx_info {
    () => {};
    ($($arg:tt)*) => {}
}

#[macro_export]
#[cfg(feature = "__log_enable_level_debug")]
macro_rules! rdmx_debug {
    () => {};
    ($($arg:tt)*) => {
        $crate::__log::debug!($($arg)*);
    }
}

#[macro_export]
#[cfg(not(feature = "__log_enable_level_debug"))]
macro_rules! rdmx_debug {
    () => {};
    ($($arg:tt)*) => {}
}

#[macro_export]
#[cfg(feature = "__log_enable_level_trace")]
macro_rules! rdmx_trace {
    () => {};
    ($($arg:tt)*) => {
        $crate::__log::trace!($($arg)*);
    }
}

#[macro_export]
#[cfg(not(feature = "__log_enable_level_trace"))]
macro_rules! rdmx_trace {
    () => {};
    ($($arg:tt)*) => {}
}
