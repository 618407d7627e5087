//! Scoped "C" numeric locale
//!
//! Descriptor and container files always use `.` as the decimal separator.
//! Any C code sharing the process (a device driver's kernel compiler, for
//! one) formats and parses numbers through the process locale, so loading
//! and saving run with `LC_NUMERIC` forced to "C" and restored afterwards.
//!
//! `setlocale` is process-global. The guard assumes one load or save runs
//! at a time and that no other thread changes the locale meanwhile.

use std::ffi::{CStr, CString};
use std::ptr;

const C_LOCALE: &[u8] = b"C\0";

/// Sets `LC_NUMERIC` to "C" and restores the previous value on drop
///
/// Restoration happens on every exit path, including early `?` returns and
/// unwinding.
#[derive(Debug)]
pub struct NumericLocaleGuard {
    previous: Option<CString>,
}

impl NumericLocaleGuard {
    /// Switch to the "C" numeric locale
    pub fn acquire() -> Self {
        let previous = current_numeric_locale_raw();
        // SAFETY: C_LOCALE is a valid NUL-terminated string
        unsafe {
            libc::setlocale(libc::LC_NUMERIC, C_LOCALE.as_ptr() as *const libc::c_char);
        }
        tracing::trace!(previous = ?previous, "numeric locale set to C");
        Self { previous }
    }

    /// Switch to a named numeric locale, or `None` if the host lacks it
    ///
    /// The locale is left untouched when the switch fails.
    pub fn acquire_named(name: &str) -> Option<Self> {
        let requested = CString::new(name).ok()?;
        let previous = current_numeric_locale_raw();
        // SAFETY: requested is an owned NUL-terminated string
        let switched = unsafe { libc::setlocale(libc::LC_NUMERIC, requested.as_ptr()) };
        if switched.is_null() {
            return None;
        }
        tracing::trace!(previous = ?previous, locale = name, "numeric locale switched");
        Some(Self { previous })
    }

    /// The locale that will be restored
    pub fn previous(&self) -> Option<&CStr> {
        self.previous.as_deref()
    }
}

impl Drop for NumericLocaleGuard {
    fn drop(&mut self) {
        if let Some(previous) = &self.previous {
            // SAFETY: previous is an owned NUL-terminated copy
            unsafe {
                libc::setlocale(libc::LC_NUMERIC, previous.as_ptr());
            }
        }
    }
}

fn current_numeric_locale_raw() -> Option<CString> {
    // SAFETY: a null locale argument only queries; the returned pointer is
    // copied before any further setlocale call can invalidate it
    unsafe {
        let current = libc::setlocale(libc::LC_NUMERIC, ptr::null());
        if current.is_null() {
            None
        } else {
            Some(CStr::from_ptr(current).to_owned())
        }
    }
}

/// Name of the current numeric locale
pub fn current_numeric_locale() -> Option<String> {
    current_numeric_locale_raw().map(|s| s.to_string_lossy().into_owned())
}

/// Locales other than "C" commonly present on hosts
pub const NON_C_LOCALES: &[&str] = &["C.UTF-8", "C.utf8", "en_US.UTF-8", "en_US.utf8"];

/// Switch to the first available locale from [`NON_C_LOCALES`]
pub fn acquire_non_c_locale() -> Option<NumericLocaleGuard> {
    NON_C_LOCALES
        .iter()
        .find_map(|name| NumericLocaleGuard::acquire_named(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    // setlocale is process-global, so every check lives in one test
    #[test]
    fn test_guard_restores_previous_locale() {
        let Some(outer) = acquire_non_c_locale() else {
            eprintln!("no non-C locale installed; skipping");
            return;
        };
        let baseline = current_numeric_locale();
        assert_ne!(baseline.as_deref(), Some("C"));

        {
            let guard = NumericLocaleGuard::acquire();
            assert_eq!(current_numeric_locale().as_deref(), Some("C"));
            assert_eq!(
                guard.previous().map(|s| s.to_string_lossy().into_owned()),
                baseline
            );
        }
        assert_eq!(current_numeric_locale(), baseline);

        fn failing() -> Result<(), String> {
            let _guard = NumericLocaleGuard::acquire();
            assert_eq!(current_numeric_locale().as_deref(), Some("C"));
            Err::<(), String>("parse failed".to_string())?;
            Ok(())
        }
        assert!(failing().is_err());
        assert_eq!(current_numeric_locale(), baseline);

        let unwound = std::panic::catch_unwind(|| {
            let _guard = NumericLocaleGuard::acquire();
            panic!("load aborted");
        });
        assert!(unwound.is_err());
        assert_eq!(current_numeric_locale(), baseline);

        assert!(NumericLocaleGuard::acquire_named("no_such_locale.XYZ").is_none());
        assert_eq!(current_numeric_locale(), baseline);

        drop(outer);
    }
}
