//! Interface name and index resolution.
//!
//! The route and address paths only need name/index mapping, which the
//! C library provides portably; no netlink link management is exposed.

use std::ffi::{CStr, CString};

use super::error::{Error, Result};

/// Resolve an interface name to its index.
pub fn ifname_to_index(name: &str) -> Result<u32> {
    let cname = CString::new(name)
        .map_err(|_| Error::InvalidInput(format!("interface name contains NUL: {:?}", name)))?;
    // SAFETY: cname is a valid NUL-terminated string.
    let index = unsafe { libc::if_nametoindex(cname.as_ptr()) };
    if index == 0 {
        return Err(Error::InterfaceNotFound { name: name.into() });
    }
    Ok(index)
}

/// Resolve an interface index to its name.
pub fn ifindex_to_name(index: u32) -> Result<String> {
    let mut buf = [0u8; libc::IF_NAMESIZE];
    // SAFETY: buf is IF_NAMESIZE bytes, the documented minimum.
    let ret = unsafe { libc::if_indextoname(index, buf.as_mut_ptr() as *mut libc::c_char) };
    if ret.is_null() {
        return Err(Error::InterfaceNotFound {
            name: format!("index {}", index),
        });
    }
    // SAFETY: if_indextoname NUL-terminates on success.
    let name = unsafe { CStr::from_ptr(buf.as_ptr() as *const libc::c_char) };
    Ok(name.to_string_lossy().into_owned())
}
