use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;
use authz::Sid;
use crate::decoder::{decode_ace_list, DecodedAce};
use crate::directory::{AccessTemplateLink, Directory, Identity, LinkFilter};
use crate::error::ArlinksError;
use crate::html::HtmlSession;
use crate::names::NameResolver;

const INDENT: &str = "      ";
const CSV_HEADERS: [&str; 7] = ["Input", "Trustee", "Access Template", "Directory Object", "Type", "Permissions", "Apply To"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FilterAxis {
    Trustee,
    AccessTemplate,
    DirectoryObject,
}

impl FilterAxis {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Trustee => "Trustee",
            Self::AccessTemplate => "Access Template",
            Self::DirectoryObject => "Directory Object",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ReportOptions {
    pub axis: FilterAxis,
    pub list_permissions: bool,
    /// Directory where one HTML file per input is written, if exporting
    pub html_dir: Option<PathBuf>,
    pub csv: bool,
}

#[derive(Debug, Default)]
pub(crate) struct RunSummary {
    pub html_files: Vec<PathBuf>,
    pub failures: Vec<(String, ArlinksError)>,
}

enum Output<W: Write> {
    Text(W),
    Csv(csv::Writer<W>),
}

/// A link with every reference resolved to a displayable name.
#[derive(Debug, Clone)]
struct LinkRow {
    trustee: String,
    access_template: String,
    directory_object: String,
}

pub(crate) struct Report<'a, W: Write> {
    directory: &'a dyn Directory,
    names: NameResolver<'a>,
    options: ReportOptions,
    output: Output<W>,
    // Keyed by lowercase template DN, so that each template is decoded once per run
    decoded_templates: HashMap<String, Rc<Vec<DecodedAce>>>,
    trustee_names: HashMap<Sid, String>,
}

pub(crate) fn render_permission_table(aces: &[DecodedAce]) -> Vec<String> {
    let headers = ["Type", "Permissions", "Apply To"];
    let rows: Vec<[String; 3]> = aces.iter()
        .filter_map(DecodedAce::permission)
        .map(|p| [p.effect.to_string(), p.permissions.clone(), p.apply_to.clone()])
        .collect();
    let mut widths = headers.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }
    let format_row = |cells: [&str; 3]| -> String {
        format!("{}{:w0$}  {:w1$}  {}", INDENT, cells[0], cells[1], cells[2], w0 = widths[0], w1 = widths[1])
            .trim_end()
            .to_owned()
    };

    let mut lines = vec![format_row(headers)];
    let rules = widths.map(|w| "-".repeat(w));
    lines.push(format_row([rules[0].as_str(), rules[1].as_str(), rules[2].as_str()]));
    if rows.is_empty() {
        lines.push(format!("{}(no permissions)", INDENT));
    }
    for row in &rows {
        lines.push(format_row([row[0].as_str(), row[1].as_str(), row[2].as_str()]));
    }
    for ace in aces {
        if let DecodedAce::Failed { token, reason } = ace {
            lines.push(format!("{}/!\\ unable to decode [{}] : {}", INDENT, token, reason));
        }
    }
    lines
}

impl<'a, W: Write> Report<'a, W> {
    pub fn new(directory: &'a dyn Directory, names: NameResolver<'a>, options: ReportOptions, out: W) -> Result<Self, ArlinksError> {
        log::debug!("reporting by {} with display names of locale {}", options.axis.label().to_lowercase(), names.locale());
        let output = if options.csv {
            let mut writer = csv::Writer::from_writer(out);
            writer.write_record(&CSV_HEADERS)?;
            Output::Csv(writer)
        } else {
            Output::Text(out)
        };
        Ok(Self {
            directory,
            names,
            options,
            output,
            decoded_templates: HashMap::new(),
            trustee_names: HashMap::new(),
        })
    }

    /// Reports on each input in order. Inputs which cannot be reported on are
    /// collected in the summary and do not stop the others.
    pub fn run(&mut self, inputs: &[String]) -> RunSummary {
        let mut summary = RunSummary::default();
        for input in inputs {
            match self.report_one(input) {
                Ok(Some(path)) => summary.html_files.push(path),
                Ok(None) => (),
                Err(e) => {
                    eprintln!(" [!] Unable to report on {} \"{}\" : {}", self.options.axis.label().to_lowercase(), input, e);
                    log::debug!("{:?}", e);
                    summary.failures.push((input.clone(), e));
                },
            }
        }
        summary
    }

    /// Flushes buffered output and hands the underlying writer back.
    pub fn finish(self) -> Result<W, ArlinksError> {
        match self.output {
            Output::Text(mut w) => {
                w.flush()?;
                Ok(w)
            },
            Output::Csv(w) => w.into_inner().map_err(|e| ArlinksError::Io(e.into_error())),
        }
    }

    fn text(&mut self, line: &str) -> Result<(), ArlinksError> {
        if let Output::Text(w) = &mut self.output {
            writeln!(w, "{}", line)?;
        }
        Ok(())
    }

    fn csv(&mut self, record: [&str; 7]) -> Result<(), ArlinksError> {
        if let Output::Csv(w) = &mut self.output {
            w.write_record(&record)?;
        }
        Ok(())
    }

    fn trustee_name(&mut self, sid: &Sid) -> Result<String, ArlinksError> {
        if let Some(name) = self.trustee_names.get(sid) {
            return Ok(name.clone());
        }
        let name = match self.directory.find_object_by_sid(sid)? {
            Some(object) => object.dn,
            None => {
                log::debug!("trustee {} does not resolve to an object", sid);
                sid.to_string()
            },
        };
        self.trustee_names.insert(sid.clone(), name.clone());
        Ok(name)
    }

    fn resolve_link(&mut self, link: &AccessTemplateLink) -> Result<LinkRow, ArlinksError> {
        log::debug!("resolving link {}", link.dn);
        Ok(LinkRow {
            trustee: self.trustee_name(&link.trustee)?,
            access_template: link.access_template.clone(),
            directory_object: link.directory_object.clone(),
        })
    }

    /// Decoded effective ACE list of a template, decoded on first use only.
    fn template_permissions(&mut self, template_dn: &str) -> Result<Rc<Vec<DecodedAce>>, ArlinksError> {
        let key = template_dn.to_lowercase();
        if let Some(aces) = self.decoded_templates.get(&key) {
            return Ok(Rc::clone(aces));
        }
        let ace_list = self.directory.access_template_aces(template_dn)?
            .ok_or_else(|| ArlinksError::AceListMissing { template: template_dn.to_owned() })?;
        let aces = Rc::new(decode_ace_list(&ace_list, &mut self.names));
        log::debug!("decoded {} ACE(s) of {}", aces.len(), template_dn);
        self.decoded_templates.insert(key, Rc::clone(&aces));
        Ok(aces)
    }

    fn write_permissions(&mut self, input: &str, row: &LinkRow, template_dn: &str, html: Option<&mut HtmlSession>) -> Result<(), ArlinksError> {
        let aces = match self.template_permissions(template_dn) {
            Ok(aces) => aces,
            Err(e) => {
                log::warn!("{}", e);
                self.text(&format!("{}/!\\ {}", INDENT, e))?;
                self.csv([input, &row.trustee, &row.access_template, &row.directory_object, "Warning", &e.to_string(), ""])?;
                return Ok(());
            },
        };
        for line in render_permission_table(&aces) {
            self.text(&line)?;
        }
        for ace in aces.iter() {
            match ace {
                DecodedAce::Permission(p) => {
                    let effect = p.effect.to_string();
                    self.csv([input, &row.trustee, &row.access_template, &row.directory_object, &effect, &p.permissions, &p.apply_to])?;
                },
                DecodedAce::Failed { token, reason } => {
                    self.csv([input, &row.trustee, &row.access_template, &row.directory_object, "Warning", &format!("unable to decode [{}] : {}", token, reason), ""])?;
                },
            }
        }
        if let Some(html) = html {
            html.permissions(&aces)?;
        }
        Ok(())
    }

    fn report_one(&mut self, input: &str) -> Result<Option<PathBuf>, ArlinksError> {
        let axis = self.options.axis;
        let identity = Identity::parse(input);
        let not_found = || ArlinksError::ObjectNotFound {
            kind: axis.label(),
            identity: input.to_owned(),
        };
        let (subject_dn, links) = match axis {
            FilterAxis::Trustee => {
                let trustee = self.directory.find_object(&identity)?.ok_or_else(not_found)?;
                let sid = trustee.sid.clone().ok_or_else(|| ArlinksError::NotATrustee { dn: trustee.dn.clone() })?;
                (trustee.dn, self.directory.enumerate_links(LinkFilter::Trustee(&sid))?)
            },
            FilterAxis::AccessTemplate => {
                let template = self.directory.find_access_template(&identity)?.ok_or_else(not_found)?;
                let links = self.directory.enumerate_links(LinkFilter::AccessTemplate(&template.dn))?;
                (template.dn, links)
            },
            FilterAxis::DirectoryObject => {
                let object = self.directory.find_object(&identity)?.ok_or_else(not_found)?;
                let links = self.directory.enumerate_links(LinkFilter::DirectoryObject(&object.dn))?;
                (object.dn, links)
            },
        };
        log::info!("{} link(s) found for {} {}", links.len(), axis.label().to_lowercase(), subject_dn);
        let rows = links.iter()
            .map(|l| self.resolve_link(l))
            .collect::<Result<Vec<LinkRow>, ArlinksError>>()?;

        let mut html = match &self.options.html_dir {
            Some(dir) => {
                let session = HtmlSession::create(dir, &format!("Access Template Links for {} {}", axis.label(), input))?;
                log::info!("exporting {} to {}", input, session.path().display());
                Some(session)
            },
            None => None,
        };

        self.text(&format!("=== {}: {}", axis.label(), subject_dn))?;
        if rows.is_empty() {
            self.text("Access Template Links: NONE")?;
            let (trustee, template, object) = match axis {
                FilterAxis::Trustee => (subject_dn.as_str(), "", ""),
                FilterAxis::AccessTemplate => ("", subject_dn.as_str(), ""),
                FilterAxis::DirectoryObject => ("", "", subject_dn.as_str()),
            };
            self.csv([input, trustee, template, object, "NONE", "", ""])?;
            if let Some(html) = html.as_mut() {
                html.summary(&format!("{}: {}", axis.label(), subject_dn))?;
                html.none()?;
            }
        } else {
            self.text(&format!("Access Template Links: {}", rows.len()))?;
            if let Some(html) = html.as_mut() {
                html.summary(&format!("{}: {} ({} Access Template Link(s))", axis.label(), subject_dn, rows.len()))?;
            }
            for (i, row) in rows.iter().enumerate() {
                let fields: [(&str, &str); 2] = match axis {
                    FilterAxis::Trustee => [("Access Template", row.access_template.as_str()), ("Directory Object", row.directory_object.as_str())],
                    FilterAxis::AccessTemplate => [("Trustee", row.trustee.as_str()), ("Directory Object", row.directory_object.as_str())],
                    FilterAxis::DirectoryObject => [("Trustee", row.trustee.as_str()), ("Access Template", row.access_template.as_str())],
                };
                self.text(&format!("  [{}] {:17}: {}", i + 1, fields[0].0, fields[0].1))?;
                self.text(&format!("{}{:17}: {}", INDENT, fields[1].0, fields[1].1))?;
                if let Some(html) = html.as_mut() {
                    html.link(&fields)?;
                }
                if self.options.list_permissions && axis != FilterAxis::AccessTemplate {
                    self.write_permissions(input, row, &row.access_template, html.as_mut())?;
                } else if !self.options.list_permissions {
                    self.csv([input, &row.trustee, &row.access_template, &row.directory_object, "", "", ""])?;
                }
            }
            // Every link of a template delegates the same permissions: list them once
            if self.options.list_permissions && axis == FilterAxis::AccessTemplate {
                self.text(&format!("  Permissions of {}:", subject_dn))?;
                if let Some(html) = html.as_mut() {
                    html.summary(&format!("Permissions of {}", subject_dn))?;
                }
                if self.options.csv {
                    for row in &rows {
                        self.write_permissions(input, row, &subject_dn, None)?;
                    }
                    if let Some(html) = html.as_mut() {
                        let aces = self.template_permissions(&subject_dn)?;
                        html.permissions(&aces)?;
                    }
                } else {
                    let row = LinkRow {
                        trustee: String::new(),
                        access_template: subject_dn.clone(),
                        directory_object: String::new(),
                    };
                    self.write_permissions(input, &row, &subject_dn, html.as_mut())?;
                }
            }
        }
        self.text("")?;

        match html {
            Some(session) => Ok(Some(session.finish()?)),
            None => Ok(None),
        }
    }
}
