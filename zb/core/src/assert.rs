//! Fatal invariant checks.
//!
//! A broken invariant inside a state machine cannot be recovered locally, so
//! the check logs the failing site and halts the stack.

/// Log the failing site and halt.
#[cold]
pub fn fatal(code: u16, file: &'static str, line: u32) -> ! {
    log::error!("fatal assert 0x{:04x} at {}:{}", code, file, line);
    panic!("fatal assert 0x{:04x}", code);
}

/// Halts the stack when `cond` is false.
///
/// The `code` identifies the call site in logs the same way the numeric
/// assert ids do in field traces.
#[macro_export]
macro_rules! sys_assert_fatal {
    ($cond:expr, $code:expr) => {
        if !$cond {
            $crate::assert::fatal($code as u16, file!(), line!());
        }
    };
}

/// Unconditional form of [`sys_assert_fatal!`] for unreachable states.
#[macro_export]
macro_rules! sys_fatal {
    ($code:expr) => {
        $crate::assert::fatal($code as u16, file!(), line!())
    };
}

/// Assert codes raised by the stack.
pub mod codes {
    pub const NWK_JOIN_BAD_STATE: u16 = 0x3101;
    pub const NWK_LEAVE_BAD_STATE: u16 = 0x3201;
    pub const NWK_REPORT_BAD_STATE: u16 = 0x3301;
    pub const APS_BAD_STATE: u16 = 0x4001;
}
