use std::path::{Component, Path, PathBuf};
use crate::directory::{first_rdn, looks_like_rdn};

/// Flattens repeated and comma-separated argument values, preserving their order.
///
/// Escaped commas never split a value. Within one argument, a segment shaped like
/// an RDN continues the previous value when that value is a DN, so
/// "Helpdesk,CN=Server Admins,DC=corp" gives "Helpdesk" and "CN=Server Admins,DC=corp".
/// Several DNs have to be passed as repeated arguments.
pub(crate) fn split_values<'a, I: IntoIterator<Item = &'a str>>(values: I) -> Vec<String> {
    let mut res: Vec<String> = Vec::new();
    for value in values {
        let mut in_dn = false;
        let mut rest = value;
        loop {
            let segment = first_rdn(rest);
            let item = segment.trim();
            let is_rdn = looks_like_rdn(item);
            if in_dn && is_rdn {
                if let Some(last) = res.last_mut() {
                    last.push(',');
                    last.push_str(item);
                }
            } else if item.is_empty() {
                in_dn = false;
            } else {
                in_dn = is_rdn;
                res.push(item.to_owned());
            }
            if segment.len() >= rest.len() {
                break;
            }
            rest = &rest[segment.len() + 1..];
        }
    }
    res
}

/// Makes a user-supplied directory absolute, so that the paths printed and copied
/// to the clipboard do not depend on the working directory.
pub(crate) fn absolute_path(dir: &Path) -> std::io::Result<PathBuf> {
    let dir = if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        std::env::current_dir()?.join(dir)
    };
    Ok(dir.components().filter(|c| *c != Component::CurDir).collect())
}

pub(crate) fn default_export_path() -> PathBuf {
    std::env::temp_dir().join("ARLinks")
}

#[cfg(windows)]
pub(crate) fn get_client_locale() -> Option<u32> {
    let lcid = unsafe { windows::Win32::Globalization::GetUserDefaultLCID() };
    if lcid == 0 {
        None
    } else {
        Some(lcid)
    }
}

#[cfg(not(windows))]
pub(crate) fn get_client_locale() -> Option<u32> {
    log::warn!("client locale is only available on Windows, using default display specifiers");
    None
}

#[cfg(windows)]
pub(crate) fn copy_to_clipboard(path: &Path) {
    use std::io::Write;
    use std::process::{Command, Stdio};

    let res = Command::new("clip.exe")
        .stdin(Stdio::piped())
        .spawn()
        .and_then(|mut child| {
            // stdin must be closed before waiting, clip.exe reads until EOF
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(path.to_string_lossy().as_bytes())?;
            }
            child.wait()
        });
    match res {
        Ok(status) if status.success() => log::debug!("copied {} to the clipboard", path.display()),
        Ok(status) => log::warn!("clip.exe exited with {}", status),
        Err(e) => log::warn!("unable to copy {} to the clipboard: {}", path.display(), e),
    }
}

#[cfg(not(windows))]
pub(crate) fn copy_to_clipboard(path: &Path) {
    log::info!("clipboard is only available on Windows, not copying {}", path.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_env_log::test;

    #[test]
    fn comma_separated_and_repeated_values() {
        let values = split_values(vec!["Helpdesk, Server Admins", "CORP\\jdoe", " ,"]);
        assert_eq!(values, vec!["Helpdesk", "Server Admins", "CORP\\jdoe"]);
    }

    #[test]
    fn dn_values_keep_their_commas() {
        let values = split_values(vec![
            "Helpdesk,CN=Server Admins,OU=Groups,DC=corp,DC=local",
            "OU=Sales\\, EMEA, DC=corp,DC=local",
            "CN=Helpdesk,Server Admins",
        ]);
        assert_eq!(values, vec![
            "Helpdesk",
            "CN=Server Admins,OU=Groups,DC=corp,DC=local",
            "OU=Sales\\, EMEA,DC=corp,DC=local",
            "CN=Helpdesk",
            "Server Admins",
        ]);
    }

    #[test]
    fn export_path_is_in_temp_dir() {
        assert!(default_export_path().starts_with(std::env::temp_dir()));
    }

    #[test]
    fn relative_export_path_is_made_absolute() {
        let cwd = std::env::current_dir().unwrap();
        let dir = absolute_path(Path::new("./reports/ARLinks")).unwrap();
        assert!(dir.is_absolute());
        assert_eq!(dir, cwd.join("reports").join("ARLinks"));

        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(absolute_path(tmp.path()).unwrap(), tmp.path());
    }
}
