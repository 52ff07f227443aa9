use windows::Win32::Networking::Ldap::{LdapGetLastError, ldap_err2stringW};

pub(crate) fn str_to_wstr(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

pub(crate) fn pwstr_to_str(ptr: *const u16) -> String {
    let mut len = 0;
    unsafe {
        while *(ptr.add(len)) != 0 {
            len += 1;
        }
    }
    let slice = unsafe { std::slice::from_raw_parts(ptr, len) };
    String::from_utf16_lossy(slice)
}

pub(crate) fn get_ldap_errcode() -> u32 {
    unsafe { LdapGetLastError() }
}

pub(crate) fn get_ldap_errmsg(code: u32) -> String {
    let res = unsafe { ldap_err2stringW(code) };
    if res.is_null() {
        format!("unknown error, code {}", code)
    } else {
        format!("{} (code {})", pwstr_to_str(res.0), code)
    }
}
