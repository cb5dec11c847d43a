// SPDX-License-Identifier: Apache-2.0

//! Scoped capture of Z3's error callback.
//!
//! Z3 reports errors through a parameterless C callback, so delivery to the
//! encoder that triggered the error goes through a thread-local stack of
//! diagnostic channels: entering a visit pushes a channel, leaving pops it,
//! and the most recent channel receives whatever the callback reports.
//! Installations nest across reentrant encoders sharing a context.

use std::cell::RefCell;
use std::ffi::CStr;
use std::rc::Rc;

use z3_sys::{ErrorCode, Z3_context, Z3_get_error_msg, Z3_set_error_handler};

use crate::error::{Error, Result};

type Channel = Rc<RefCell<Option<String>>>;

thread_local! {
    static CHANNEL_STACK: RefCell<Vec<Channel>> = RefCell::new(Vec::new());
}

unsafe extern "C" fn error_callback(ctx: Z3_context, code: ErrorCode) {
    let message = CStr::from_ptr(Z3_get_error_msg(ctx, code))
        .to_string_lossy()
        .into_owned();
    log::error!("Z3 error: {}", message);
    CHANNEL_STACK.with(|stack| {
        if let Some(top) = stack.borrow().last() {
            *top.borrow_mut() = Some(message);
        }
    });
}

/// Captures Z3 errors raised while the handler is alive and converts them to
/// a status on request. The callback is released on every exit path via
/// `Drop`.
pub struct ScopedErrorHandler {
    ctx: Z3_context,
    channel: Channel,
}

impl ScopedErrorHandler {
    pub fn new(ctx: Z3_context) -> Self {
        let channel: Channel = Rc::new(RefCell::new(None));
        CHANNEL_STACK.with(|stack| stack.borrow_mut().push(channel.clone()));
        unsafe { Z3_set_error_handler(ctx, Some(error_callback)) };
        ScopedErrorHandler { ctx, channel }
    }

    /// Returns an `Internal` error if the callback fired while this handler
    /// was the most recent installation.
    pub fn status(&self) -> Result<()> {
        match self.channel.borrow().as_ref() {
            Some(message) => Err(Error::Internal(format!("Z3 error: {}", message))),
            None => Ok(()),
        }
    }
}

impl Drop for ScopedErrorHandler {
    fn drop(&mut self) {
        CHANNEL_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            let popped = stack.pop();
            debug_assert!(
                popped.map_or(false, |c| Rc::ptr_eq(&c, &self.channel)),
                "scoped error handlers must be released in LIFO order"
            );
            if stack.is_empty() {
                unsafe { Z3_set_error_handler(self.ctx, None) };
            }
        });
    }
}
