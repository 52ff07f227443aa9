use std::fs::{File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use crate::decoder::DecodedAce;
use crate::error::ArlinksError;

const FILE_PREFIX: &str = "ARLinks";

const STYLE: &str = "body { font-family: Segoe UI, Arial, sans-serif; font-size: 10pt; color: #222; margin: 1.5em; }
h1 { font-size: 14pt; color: #1f4e79; }
p.summary { font-weight: bold; }
dl { margin: 0.5em 0; }
dt { float: left; clear: left; width: 10em; font-weight: bold; }
dd { margin-left: 11em; }
p.none { font-style: italic; color: #888; }
table { border-collapse: collapse; margin: 0.5em 0 0.5em 2em; }
th, td { border: 1px solid #aaa; padding: 2px 8px; text-align: left; }
th { background-color: #dde7f0; }
td.deny { color: #b00; font-weight: bold; }
td.failed { color: #b00; font-style: italic; }
hr { border: 0; border-top: 1px solid #ccc; }";

pub(crate) fn escape(s: &str) -> String {
    let mut res = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => res.push_str("&amp;"),
            '<' => res.push_str("&lt;"),
            '>' => res.push_str("&gt;"),
            '"' => res.push_str("&quot;"),
            '\'' => res.push_str("&#39;"),
            c => res.push(c),
        }
    }
    res
}

fn timestamp() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    format!("{:04}{:02}{:02}-{:02}{:02}{:02}-{:03}",
        now.year(), u8::from(now.month()), now.day(),
        now.hour(), now.minute(), now.second(), now.millisecond())
}

/// One HTML report file, from creation to its closing tags. The file is created with
/// its fixed header, then reopened in append mode for the rest of the session.
pub(crate) struct HtmlSession {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl HtmlSession {
    pub fn create(dir: &Path, title: &str) -> Result<Self, ArlinksError> {
        let stem = format!("{}-{}", FILE_PREFIX, timestamp());
        let mut attempt = 0;
        let (path, mut file) = loop {
            let name = if attempt == 0 { format!("{}.html", stem) } else { format!("{}-{}.html", stem, attempt) };
            let path = dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(f) => break (path, f),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(error) => return Err(ArlinksError::ExportFailed { path, error }),
            }
        };

        let begin = format!("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\"/>\n<title>{title}</title>\n<style>\n{style}\n</style>\n</head>\n<body>\n<h1>{title}</h1>\n",
            title = escape(title), style = STYLE);
        if let Err(error) = file.write_all(begin.as_bytes()) {
            return Err(ArlinksError::ExportFailed { path, error });
        }
        drop(file);

        let file = match OpenOptions::new().append(true).open(&path) {
            Ok(f) => f,
            Err(error) => return Err(ArlinksError::ExportFailed { path, error }),
        };
        log::debug!("writing HTML report {}", path.display());
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&mut self, html: &str) -> Result<(), ArlinksError> {
        self.writer.write_all(html.as_bytes()).map_err(|error| ArlinksError::ExportFailed {
            path: self.path.clone(),
            error,
        })
    }

    pub fn summary(&mut self, text: &str) -> Result<(), ArlinksError> {
        self.write(&format!("<p class=\"summary\">{}</p>\n", escape(text)))
    }

    pub fn none(&mut self) -> Result<(), ArlinksError> {
        self.write("<p class=\"none\">NONE</p>\n")
    }

    /// Starts a new entry, separated from the previous one by a rule.
    pub fn link(&mut self, fields: &[(&str, &str)]) -> Result<(), ArlinksError> {
        let mut html = String::from("<hr/>\n<dl>\n");
        for (label, value) in fields {
            html.push_str(&format!("<dt>{}</dt><dd>{}</dd>\n", escape(label), escape(value)));
        }
        html.push_str("</dl>\n");
        self.write(&html)
    }

    pub fn permissions(&mut self, aces: &[DecodedAce]) -> Result<(), ArlinksError> {
        let mut html = String::from("<table>\n<tr><th>Type</th><th>Permissions</th><th>Apply To</th></tr>\n");
        for ace in aces {
            match ace {
                DecodedAce::Permission(p) => {
                    let effect = p.effect.to_string();
                    let class = if effect == "Deny" { " class=\"deny\"" } else { "" };
                    html.push_str(&format!("<tr><td{}>{}</td><td>{}</td><td>{}</td></tr>\n",
                        class, escape(&effect), escape(&p.permissions), escape(&p.apply_to)));
                },
                DecodedAce::Failed { token, reason } => {
                    html.push_str(&format!("<tr><td class=\"failed\" colspan=\"3\">Unable to decode [{}]: {}</td></tr>\n",
                        escape(token), escape(reason)));
                },
            }
        }
        html.push_str("</table>\n");
        self.write(&html)
    }

    /// Writes the closing tags and flushes the file, returning its path.
    pub fn finish(mut self) -> Result<PathBuf, ArlinksError> {
        self.write("</body>\n</html>\n")?;
        if let Err(error) = self.writer.flush() {
            return Err(ArlinksError::ExportFailed { path: self.path.clone(), error });
        }
        Ok(self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authz::AceEffect;
    use test_env_log::test;
    use crate::decoder::DecodedPermission;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape("<a href=\"x\">R&D's</a>"), "&lt;a href=&quot;x&quot;&gt;R&amp;D&#39;s&lt;/a&gt;");
    }

    #[test]
    fn writes_a_complete_document() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = HtmlSession::create(dir.path(), "Access Template Links for Helpdesk").unwrap();
        session.summary("Access Template Links: 1").unwrap();
        session.link(&[("Access Template", "CN=R&D,CN=Access Templates"), ("Directory Object", "OU=Users")]).unwrap();
        session.permissions(&[
            DecodedAce::Permission(DecodedPermission { effect: AceEffect::Deny, permissions: "Delete".to_owned(), apply_to: "All Classes".to_owned() }),
            DecodedAce::Failed { token: "A;".to_owned(), reason: "too short".to_owned() },
        ]).unwrap();
        let path = session.finish().unwrap();

        let html = std::fs::read_to_string(&path).unwrap();
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("ARLinks-"));
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.trim_end().ends_with("</html>"));
        assert!(html.contains("<h1>Access Template Links for Helpdesk</h1>"));
        assert!(html.contains("<hr/>"));
        assert!(html.contains("CN=R&amp;D,CN=Access Templates"));
        assert!(html.contains("<td class=\"deny\">Deny</td><td>Delete</td><td>All Classes</td>"));
        assert!(html.contains("Unable to decode [A;]"));
    }

    #[test]
    fn file_names_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let first = HtmlSession::create(dir.path(), "one").unwrap();
        let second = HtmlSession::create(dir.path(), "two").unwrap();
        assert_ne!(first.path(), second.path());
        let first = first.finish().unwrap();
        let second = second.finish().unwrap();
        assert!(std::fs::read_to_string(first).unwrap().contains("<h1>one</h1>"));
        assert!(std::fs::read_to_string(second).unwrap().contains("<h1>two</h1>"));
    }

    #[test]
    fn dropped_session_is_flushed() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let mut session = HtmlSession::create(dir.path(), "partial").unwrap();
            session.none().unwrap();
            session.path().to_owned()
        };
        assert!(std::fs::read_to_string(path).unwrap().contains("NONE"));
    }
}
